//! Nullable request whose phase, method and verifier are set by the test.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keyverify_types::{CancellationCode, DeviceId, Method, Phase, QrCodeData, UserId};
use keyverify_verification::{
    AdapterError, Listener, ListenerRegistry, MethodCatalog, SubscriptionId, VerificationRequest,
    Verifier,
};

use crate::verifier::{HandshakeMode, NullVerifier};

struct Inner {
    phase: Phase,
    chosen_method: Option<Method>,
    peer_methods: Vec<Method>,
    qr_code_data: Option<QrCodeData>,
    is_self_verification: bool,
    own_user_id: UserId,
    other_user_id: UserId,
    other_device_id: Option<DeviceId>,
    cancellation_code: Option<CancellationCode>,
    cancelling_user_id: Option<UserId>,
    verifier: Option<Arc<NullVerifier>>,
    handshake_mode: HandshakeMode,
    begin_failure: Option<AdapterError>,
    begin_calls: usize,
}

/// A test request. Every mutation emits `change`, like the real one.
pub struct NullRequest {
    inner: Mutex<Inner>,
    change: ListenerRegistry,
    catalog: MethodCatalog,
}

pub struct NullRequestBuilder {
    inner: Inner,
    catalog: MethodCatalog,
}

impl NullRequestBuilder {
    pub fn phase(mut self, phase: Phase) -> Self {
        self.inner.phase = phase;
        self
    }

    /// Methods the other party advertises.
    pub fn peer_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.inner.peer_methods = methods.into_iter().collect();
        self
    }

    pub fn own_user(mut self, user: UserId) -> Self {
        self.inner.own_user_id = user;
        self
    }

    /// Verifying one of our own devices; the other user is us.
    pub fn self_verification(mut self, device: DeviceId) -> Self {
        self.inner.is_self_verification = true;
        self.inner.other_user_id = self.inner.own_user_id.clone();
        self.inner.other_device_id = Some(device);
        self
    }

    pub fn qr_code(mut self, data: QrCodeData) -> Self {
        self.inner.qr_code_data = Some(data);
        self
    }

    /// How handshakes of verifiers created by this request settle.
    pub fn handshake_mode(mut self, mode: HandshakeMode) -> Self {
        self.inner.handshake_mode = mode;
        self
    }

    pub fn catalog(mut self, catalog: MethodCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn build(self) -> Arc<NullRequest> {
        Arc::new(NullRequest {
            inner: Mutex::new(self.inner),
            change: ListenerRegistry::new(),
            catalog: self.catalog,
        })
    }
}

impl NullRequest {
    /// Start building a request with `other_user`, in phase `Requested`,
    /// where the peer supports every method we do.
    pub fn builder(other_user: UserId) -> NullRequestBuilder {
        let own_user_id = UserId::parse("@me:localhost").expect("static user id is valid");
        let catalog = MethodCatalog::supported();
        NullRequestBuilder {
            inner: Inner {
                phase: Phase::Requested,
                chosen_method: None,
                peer_methods: catalog.methods().to_vec(),
                qr_code_data: None,
                is_self_verification: false,
                own_user_id,
                other_user_id: other_user,
                other_device_id: None,
                cancellation_code: None,
                cancelling_user_id: None,
                verifier: None,
                handshake_mode: HandshakeMode::default(),
                begin_failure: None,
                begin_calls: 0,
            },
            catalog,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and emit `change` once the lock is released.
    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let result = f(&mut self.lock());
        self.change.emit();
        result
    }

    pub fn set_phase(&self, phase: Phase) {
        self.mutate(|inner| inner.phase = phase);
    }

    /// The other party started `method`: a verifier appears and the phase
    /// moves to `Started`.
    pub fn start_verifier(&self, method: Method) -> Arc<NullVerifier> {
        self.mutate(|inner| {
            let verifier = Arc::new(NullVerifier::with_mode(
                method.clone(),
                inner.handshake_mode.clone(),
            ));
            inner.chosen_method = Some(method);
            inner.phase = Phase::Started;
            inner.verifier = Some(Arc::clone(&verifier));
            verifier
        })
    }

    pub fn set_chosen_method(&self, method: Option<Method>) {
        self.mutate(|inner| inner.chosen_method = method);
    }

    /// Swap in an arbitrary verifier.
    pub fn set_verifier(&self, verifier: Arc<NullVerifier>) {
        self.mutate(|inner| inner.verifier = Some(verifier));
    }

    pub fn detach_verifier(&self) -> Option<Arc<NullVerifier>> {
        self.mutate(|inner| inner.verifier.take())
    }

    pub fn cancel(&self, code: CancellationCode, by: &UserId) {
        self.mutate(|inner| {
            inner.phase = Phase::Cancelled;
            inner.cancellation_code = Some(code);
            inner.cancelling_user_id = Some(by.clone());
        });
    }

    pub fn complete(&self) {
        self.set_phase(Phase::Done);
    }

    /// Emit `change` without mutating anything.
    pub fn emit_change(&self) -> usize {
        self.change.emit()
    }

    /// Make the next `begin_key_verification` calls fail.
    pub fn fail_begin_with(&self, err: AdapterError) {
        self.lock().begin_failure = Some(err);
    }

    pub fn null_verifier(&self) -> Option<Arc<NullVerifier>> {
        self.lock().verifier.clone()
    }

    pub fn own_user_id(&self) -> UserId {
        self.lock().own_user_id.clone()
    }

    pub fn change_listener_count(&self) -> usize {
        self.change.len()
    }

    pub fn begin_calls(&self) -> usize {
        self.lock().begin_calls
    }
}

impl VerificationRequest for NullRequest {
    fn phase(&self) -> Phase {
        self.lock().phase
    }

    fn chosen_method(&self) -> Option<Method> {
        self.lock().chosen_method.clone()
    }

    fn other_party_supports_method(&self, method: &Method) -> bool {
        self.catalog
            .other_party_supports(&self.lock().peer_methods, method)
    }

    fn qr_code_data(&self) -> Option<QrCodeData> {
        self.lock().qr_code_data.clone()
    }

    fn is_self_verification(&self) -> bool {
        self.lock().is_self_verification
    }

    fn other_user_id(&self) -> UserId {
        self.lock().other_user_id.clone()
    }

    fn other_device_id(&self) -> Option<DeviceId> {
        self.lock().other_device_id.clone()
    }

    fn cancellation_code(&self) -> Option<CancellationCode> {
        self.lock().cancellation_code.clone()
    }

    fn cancelling_user_id(&self) -> Option<UserId> {
        self.lock().cancelling_user_id.clone()
    }

    fn verifier(&self) -> Option<Arc<dyn Verifier>> {
        self.lock()
            .verifier
            .clone()
            .map(|verifier| verifier as Arc<dyn Verifier>)
    }

    fn begin_key_verification(&self, method: Method) -> Result<Arc<dyn Verifier>, AdapterError> {
        let verifier = {
            let mut inner = self.lock();
            inner.begin_calls += 1;
            if let Some(err) = inner.begin_failure.clone() {
                return Err(err);
            }
            match inner.phase {
                Phase::Cancelled => {
                    let code = inner
                        .cancellation_code
                        .clone()
                        .unwrap_or(CancellationCode::User);
                    return Err(AdapterError::Cancelled(code));
                }
                Phase::Done => return Err(AdapterError::AlreadyResolved),
                _ => {}
            }
            if !self.catalog.other_party_supports(&inner.peer_methods, &method) {
                return Err(AdapterError::MethodNotSupported(method));
            }

            let verifier = match inner.verifier.clone() {
                Some(existing) if existing.method() == method => existing,
                _ => Arc::new(NullVerifier::with_mode(
                    method.clone(),
                    inner.handshake_mode.clone(),
                )),
            };
            inner.chosen_method = Some(method);
            inner.phase = Phase::Started;
            inner.verifier = Some(Arc::clone(&verifier));
            verifier
        };
        self.change.emit();
        Ok(verifier)
    }

    fn on_change(&self, listener: Listener) -> SubscriptionId {
        self.change.add(listener)
    }

    fn off_change(&self, id: SubscriptionId) -> bool {
        self.change.remove(id)
    }
}
