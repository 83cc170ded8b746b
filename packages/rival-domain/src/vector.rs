/// Scales a dense vector to unit L2 norm.
///
/// A zero vector is returned unchanged; dividing by a zero norm would poison
/// the whole vector with NaN.
pub fn l2_normalize(mut vec: Vec<f32>) -> Vec<f32> {
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vec {
			*value /= norm;
		}
	}

	vec
}
