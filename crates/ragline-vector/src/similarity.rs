/// Cosine similarity in `[-1, 1]`. A zero vector is similar to nothing.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let mut dot = 0f32; let mut na = 0f32; let mut nb = 0f32;
	for (x, y) in a.iter().zip(b) { dot += x * y; na += x * x; nb += y * y; }
	if na == 0.0 || nb == 0.0 { return 0.0; }
	dot / (na.sqrt() * nb.sqrt())
}
