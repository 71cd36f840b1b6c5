use crate::Event;

/// decides whether a received event is authentic.
///
/// implementations must never panic on hostile input, `false` means "drop it".
pub trait Verifier: Send + Sync + std::fmt::Debug {
    fn verify(&self, event: &Event) -> bool;
}

/// recomputes the id from the event fields and checks the BIP-340 signature
/// of that id against the declared author
#[derive(Debug, Default, Clone, Copy)]
pub struct SchnorrVerifier;

impl Verifier for SchnorrVerifier {
    fn verify(&self, event: &Event) -> bool {
        if !event.check_id() {
            log::debug!("event {} has an id that doesn't match its fields", event.id);
            return false;
        }
        event.verify_signature()
    }
}
