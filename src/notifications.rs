use crate::Error;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastKind {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub kind: ToastKind,
    pub message: String,
}

impl ToastMessage {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        let message = match error {
            Error::SigningRejected(_) => "Transaction was not signed".to_string(),
            Error::SubmissionFailure(_) | Error::ConfirmationFailure { .. } => {
                format!("Transaction failed: {error}")
            }
            other => other.to_string(),
        };
        Self::new(ToastKind::Warning, message)
    }
}

/// Transient notifications waiting to be shown. Oldest are dropped first once
/// `capacity` is reached.
#[derive(Clone, Debug)]
pub struct ToastQueue {
    capacity: usize,
    toasts: VecDeque<ToastMessage>,
}

impl ToastQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            toasts: VecDeque::new(),
        }
    }

    pub fn push(&mut self, toast: ToastMessage) {
        if self.toasts.len() == self.capacity {
            self.toasts.pop_front();
        }
        self.toasts.push_back(toast);
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn drain(&mut self) -> Vec<ToastMessage> {
        self.toasts.drain(..).collect()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn push__drops_oldest_beyond_capacity() {
        let mut queue = ToastQueue::new(2);

        queue.push(ToastMessage::new(ToastKind::Info, "a"));
        queue.push(ToastMessage::new(ToastKind::Info, "b"));
        queue.push(ToastMessage::new(ToastKind::Warning, "c"));

        let messages: Vec<_> = queue.drain().into_iter().map(|t| t.message).collect();
        assert_eq!(vec!["b", "c"], messages);
        assert!(queue.is_empty());
    }

    #[test]
    fn from_error__is_a_warning() {
        let toast = ToastMessage::from_error(&Error::SigningRejected("declined".into()));

        assert_eq!(ToastKind::Warning, toast.kind);
        assert_eq!("Transaction was not signed", toast.message);
    }
}
