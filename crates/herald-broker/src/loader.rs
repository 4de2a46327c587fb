//! One-time service loading capability.
//!
//! Hosting environments differ in how listener registrations are gathered
//! at startup. Rather than probing the environment, the host selects a
//! loader at construction time and the endpoint runs it exactly once,
//! before the first batch is dispatched.

use crate::broker::ServiceBroker;

/// Populates the broker's registration table on first use.
pub trait ServiceLoader: Send {
    /// Registers the host's listeners with the broker.
    ///
    /// Called at most once per endpoint, guarded by an already-loaded
    /// flag.
    fn load(&mut self, broker: &mut ServiceBroker);
}

/// Loader that registers nothing, for hosts that register listeners
/// directly before serving.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLoader;

impl ServiceLoader for NullLoader {
    fn load(&mut self, _broker: &mut ServiceBroker) {}
}

impl<F> ServiceLoader for F
where
    F: FnMut(&mut ServiceBroker) + Send,
{
    fn load(&mut self, broker: &mut ServiceBroker) {
        self(broker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerSpec;

    #[test]
    fn closures_act_as_loaders() {
        let mut broker = ServiceBroker::new();
        let mut loader = |broker: &mut ServiceBroker| {
            broker.register("ping", HandlerSpec::new("ping").payload(|_| Ok(None)));
        };
        ServiceLoader::load(&mut loader, &mut broker);
        assert_eq!(broker.table().lookup("ping").len(), 1);
    }

    #[test]
    fn null_loader_registers_nothing() {
        let mut broker = ServiceBroker::new();
        NullLoader.load(&mut broker);
        assert_eq!(broker.table().message_types().count(), 0);
    }
}
