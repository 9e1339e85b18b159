/// Converts interleaved samples from `from` channels to `to` channels.
///
/// Mono is duplicated into every output channel; anything folded down to
/// mono is averaged. Other layouts keep the leading channels and fill the
/// rest with the average of the source frame.
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        let mean = frame.iter().sum::<f32>() / from as f32;
        match (from, to) {
            (1, _) => out.extend(std::iter::repeat(frame[0]).take(to)),
            (_, 1) => out.push(mean),
            _ => {
                for ch in 0..to {
                    out.push(if ch < from { frame[ch] } else { mean });
                }
            }
        }
    }

    out
}
