/// Opcode trait - the pluggable encoder seam between command values and hardware words

/// A command that serializes into one or more fixed-size hardware words
///
/// The word layout is defined by the target hardware; the command buffer only
/// relies on `word_count` being exact and on `encode` writing exactly that many
/// words in order.
pub trait Opcode {
    /// Number of 64-bit words this command occupies
    fn word_count(&self) -> usize;

    /// Write the encoded words into `out`
    ///
    /// `out.len()` is always equal to `word_count()`.
    fn encode(&self, out: &mut [u64]);
}

/// A raw, already encoded word
impl Opcode for u64 {
    fn word_count(&self) -> usize {
        1
    }

    fn encode(&self, out: &mut [u64]) {
        out[0] = *self;
    }
}

/// A fixed run of already encoded words
impl<const N: usize> Opcode for [u64; N] {
    fn word_count(&self) -> usize {
        N
    }

    fn encode(&self, out: &mut [u64]) {
        out.copy_from_slice(self);
    }
}

/// A borrowed run of already encoded words
impl Opcode for &[u64] {
    fn word_count(&self) -> usize {
        self.len()
    }

    fn encode(&self, out: &mut [u64]) {
        out.copy_from_slice(self);
    }
}
