/// Owned pixel scratch memory, zero-initialised and released on drop.
///
/// Backed by `u32` words so the bytes are 4-byte aligned and can be viewed as
/// `f32` samples without copying.
#[derive(Debug, Default, Clone)]
pub struct ScratchBuffer {
    words: Vec<u32>,
    len: usize,
}

impl ScratchBuffer {
    pub fn with_len(len: usize) -> Self {
        let mut scratch = Self::default();
        scratch.reset(len);
        scratch
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resizes to `len` bytes and zeroes the contents, reusing the allocation.
    pub fn reset(&mut self, len: usize) {
        self.words.clear();
        self.words.resize(len.div_ceil(4), 0);
        self.len = len;
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u32, u8>(&self.words)[..self.len]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.words)[..self.len]
    }

    pub fn as_f32(&self) -> &[f32] {
        &bytemuck::cast_slice::<u32, f32>(&self.words)[..self.len / 4]
    }

    pub fn as_f32_mut(&mut self) -> &mut [f32] {
        let samples = self.len / 4;
        &mut bytemuck::cast_slice_mut::<u32, f32>(&mut self.words)[..samples]
    }
}

#[cfg(test)]
mod tests {
    use super::ScratchBuffer;

    #[test]
    fn float_view_aliases_bytes() {
        let mut scratch = ScratchBuffer::with_len(8);
        scratch.as_f32_mut()[1] = 1.5;
        assert_eq!(&scratch.bytes()[4..8], &1.5f32.to_ne_bytes());
        assert_eq!(scratch.as_f32(), &[0.0, 1.5]);
    }

    #[test]
    fn reset_zeroes_and_keeps_odd_lengths() {
        let mut scratch = ScratchBuffer::with_len(3);
        scratch.bytes_mut().fill(7);
        scratch.reset(5);
        assert_eq!(scratch.bytes(), &[0, 0, 0, 0, 0]);
        assert_eq!(scratch.as_f32().len(), 1);
    }
}
