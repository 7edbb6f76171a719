/// Fixed-stride frame sampler.
///
/// Detector inference dominates the processing cost, so only every Nth frame
/// is submitted to the model; the rest are passed through untouched.
#[derive(Clone, Copy, Debug)]
pub struct FrameSampler {
    stride: usize,
}

impl FrameSampler {
    pub fn new(stride: usize) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    /// Whether the frame at `frame_index` (0-based) is submitted to the
    /// detector. Pure function of the index and the stride.
    pub fn is_sampled(&self, frame_index: usize) -> bool {
        frame_index % self.stride == 0
    }
}
