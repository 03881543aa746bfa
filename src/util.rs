#[macro_export]
macro_rules! ok_or_continue {
	( $e:expr ) => (
		match $e {
			Ok(value) => value,
			Err(_e) => {
				continue;
			},
		}
	)
}

/// A row-major grid of values, used for artwork rasters.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Array2d<T: Default + Copy> {
	width: usize,
	height: usize,
	vec: Vec<T>,
}

impl<T: Default + Copy> Array2d<T> {
	pub fn new(width: usize, height: usize) -> Self {
		return Self { width, height, vec: vec![T::default(); width * height] };
	}

	/// Wrap an existing row-major buffer. Returns `None` if the buffer length doesn't match the
	/// given dimensions.
	pub fn from_vec(width: usize, height: usize, vec: Vec<T>) -> Option<Self> {
		if vec.len() != width * height {
			return None;
		}
		return Some(Self { width, height, vec });
	}

	pub fn get(&self, x: usize, y: usize) -> T {
		assert!(x < self.width);
		assert!(y < self.height);

		return self.vec[y * self.width + x];
	}

	pub fn set(&mut self, x: usize, y: usize, value: T) {
		assert!(x < self.width);
		assert!(y < self.height);

		self.vec[y * self.width + x] = value;
	}

	pub fn width(&self) -> usize { self.width }
	pub fn height(&self) -> usize { self.height }

	pub fn is_empty(&self) -> bool { self.vec.is_empty() }

	pub fn iter(&self) -> impl Iterator<Item=&T> + '_ {
		return self.vec.iter();
	}
}
