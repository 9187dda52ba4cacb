use anyhow::Result;
use candle_core::{DType, Tensor};

fn norm_epsilon(dtype: DType) -> f64 {
    match dtype { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 }
}

/// Mean of the unmasked token states, L2-normalized: `[B,T,H]` -> `[B,H]`.
///
/// A row whose mask is all zeros pools to the zero vector.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, hidden_dim) = match hidden.dims() {
        &[b, t, h] => (b, t, h),
        other => anyhow::bail!("hidden shape must be [B,T,H], got {:?}", other),
    };
    let eps = norm_epsilon(hidden.dtype());

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = (mask.sum_keepdim(1)? + eps)?;
    let mean = summed.broadcast_div(&counts)?;

    let norms = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norms)?;
    anyhow::ensure!(pooled.dims() == [batch, hidden_dim], "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}
