// Event marker trait

use std::any::Any;

/// A payload category for dispatch.
///
/// Matching is by exact concrete type: emitting a `UserCreated` never
/// reaches listeners registered for some broader event type. Instances
/// carry whatever fields they like; `as_any` is how the dispatcher hands
/// them back to typed listeners.
pub trait Event: Send + Sync + 'static {
    /// A human-readable name for logs.
    fn event_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Ping {
        seq: u32,
    }

    impl Event for Ping {
        fn event_name(&self) -> &str {
            "ping"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_downcast_through_as_any() {
        let ping = Ping { seq: 3 };
        let event: &dyn Event = &ping;
        let back = event.as_any().downcast_ref::<Ping>().unwrap();
        assert_eq!(back.seq, 3);
    }
}
