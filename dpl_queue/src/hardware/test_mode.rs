/// TestModePort trait - indexed access to the coprocessor's span buffer

/// Diagnostic test-mode interface
///
/// While test mode is enabled the span buffer can be read and written one
/// 32-bit slot at a time. Some slots only keep part of what is written; the
/// port reports what the hardware returns and never treats that as an error.
pub trait TestModePort {
    /// Number of addressable slots. Indices wrap modulo this value.
    fn slot_count(&self) -> usize;

    /// Enter test mode
    fn enable(&mut self);

    /// Leave test mode
    fn disable(&mut self);

    /// Read slot `index`
    fn read(&mut self, index: usize) -> u32;

    /// Write slot `index`
    fn write(&mut self, index: usize, value: u32);

    /// Write zero to every slot
    fn clear(&mut self) {
        for index in 0..self.slot_count() {
            self.write(index, 0);
        }
    }
}
