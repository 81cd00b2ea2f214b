//! Sequence numbers for outgoing envelopes.

/// Sequence number carried by every envelope.
pub type Seq = u64;

/// Hands out monotonically increasing sequence numbers, starting at zero.
///
/// One provider belongs to one sender context (for the server, one
/// connection's outbound loop); numbers are not coordinated across providers.
#[derive(Debug, Default)]
pub struct SeqProvider {
    current: Seq,
}

impl SeqProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next number and advances the provider.
    pub fn take(&mut self) -> Seq {
        let value = self.current;
        self.current = self.current.wrapping_add(1);
        value
    }

    /// The number the next call to [`take`](Self::take) will return.
    pub fn peek(&self) -> Seq {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_monotonic() {
        let mut seq = SeqProvider::new();
        assert_eq!(seq.take(), 0);
        assert_eq!(seq.take(), 1);
        assert_eq!(seq.peek(), 2);
        assert_eq!(seq.take(), 2);
    }

    #[test]
    fn test_providers_are_independent() {
        let mut a = SeqProvider::new();
        let mut b = SeqProvider::new();
        a.take();
        a.take();
        assert_eq!(b.take(), 0);
        assert_eq!(a.take(), 2);
    }
}
