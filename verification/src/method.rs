//! The catalog of verification methods this client supports.

use keyverify_types::Method;

/// Static list of supported methods plus capability negotiation helpers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodCatalog {
    methods: Vec<Method>,
}

impl MethodCatalog {
    /// Methods offered by default, in order of preference.
    pub fn supported() -> Self {
        Self {
            methods: vec![Method::Sas, Method::ScanQrCode, Method::ReciprocateQrCode],
        }
    }

    /// A catalog restricted to the given methods. Unknown methods are dropped.
    pub fn with_methods(methods: impl IntoIterator<Item = Method>) -> Self {
        let mut catalog = Self { methods: Vec::new() };
        for method in methods {
            if method.is_known() && !catalog.methods.contains(&method) {
                catalog.methods.push(method);
            }
        }
        catalog
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn supports(&self, method: &Method) -> bool {
        method.is_known() && self.methods.contains(method)
    }

    /// Methods both sides support, in catalog order.
    pub fn negotiate(&self, peer_methods: &[Method]) -> Vec<Method> {
        self.methods
            .iter()
            .filter(|m| peer_methods.contains(m))
            .cloned()
            .collect()
    }

    /// Whether the peer advertised `method` and we can run it too.
    pub fn other_party_supports(&self, peer_methods: &[Method], method: &Method) -> bool {
        self.supports(method) && peer_methods.contains(method)
    }
}

impl Default for MethodCatalog {
    fn default() -> Self {
        Self::supported()
    }
}
