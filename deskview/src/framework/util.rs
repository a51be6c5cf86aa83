use ahash::RandomState;
use std::any::Any;
use std::collections::{HashMap as StdHashMap, HashSet as StdHashSet};

pub type HashMap<K, V> = StdHashMap<K, V, RandomState>;
pub type HashSet<K> = StdHashSet<K, RandomState>;

/// Boxed error used wherever a native or user-supplied operation can fail
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Extracts a readable message from a payload caught by
/// [`std::panic::catch_unwind`].
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn panic_message_reads_static_and_owned_payloads() {
        let err = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "static");

        let err =
            panic::catch_unwind(|| panic!("{} {}", "owned", 1)).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "owned 1");
    }
}
