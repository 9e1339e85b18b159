//! The Buffer subsystem carries decoded, sink-formatted samples from the
//! decode thread to the delivery thread through a lock-free
//! Single-Producer Single-Consumer (SPSC) ring buffer.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

/// Producer handle for the audio buffer. Owned by the decode thread.
pub struct AudioBufferProducer {
    inner: HeapProd<f32>,
}

/// Consumer handle for the audio buffer. Read by the delivery thread.
pub struct AudioBufferConsumer {
    inner: HeapCons<f32>,
}

impl AudioBufferProducer {
    /// Pushes a slice of samples into the buffer.
    /// Returns the number of samples successfully pushed.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }

    /// Returns the number of free spaces in the buffer.
    pub fn vacant_len(&self) -> usize {
        self.inner.vacant_len()
    }
}

impl AudioBufferConsumer {
    /// Pops samples into the provided slice.
    /// Returns the number of samples successfully popped.
    pub fn pop_slice(&mut self, samples: &mut [f32]) -> usize {
        self.inner.pop_slice(samples)
    }

    /// Returns the number of samples available in the buffer.
    pub fn occupied_len(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Drops everything currently buffered.
    pub fn clear(&mut self) -> usize {
        self.inner.clear()
    }
}

/// Creates a new audio buffer with the specified capacity in samples.
/// Returns a (Producer, Consumer) pair.
pub fn create_audio_buffer(capacity: usize) -> (AudioBufferProducer, AudioBufferConsumer) {
    let rb = HeapRb::<f32>::new(capacity.max(1));
    let (prod, cons) = rb.split();
    (
        AudioBufferProducer { inner: prod },
        AudioBufferConsumer { inner: cons },
    )
}
