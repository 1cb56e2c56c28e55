use glam::{Vec2, Vec3};

use crate::render::cube_map::CubeMapError;

/// One face of a cube map, in array-layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    #[inline]
    pub fn layer(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn from_layer(layer: u32) -> Option<Self> {
        Self::ALL.get(layer as usize).copied()
    }

    /// Picks the face hit by `direction` and the texture coordinate on it,
    /// following the OpenGL cube map convention.
    ///
    /// Returns [`None`] for a zero (or non-finite) direction.
    pub fn project(direction: Vec3) -> Option<(Self, Vec2)> {
        let abs = direction.abs();
        if !direction.is_finite() || abs.max_element() == 0. {
            return None;
        }

        // (face, sc, tc, ma)
        let (face, sc, tc, ma) = if abs.x >= abs.y && abs.x >= abs.z {
            if direction.x > 0. {
                (CubeFace::PositiveX, -direction.z, -direction.y, abs.x)
            } else {
                (CubeFace::NegativeX, direction.z, -direction.y, abs.x)
            }
        } else if abs.y >= abs.z {
            if direction.y > 0. {
                (CubeFace::PositiveY, direction.x, direction.z, abs.y)
            } else {
                (CubeFace::NegativeY, direction.x, -direction.z, abs.y)
            }
        } else if direction.z > 0. {
            (CubeFace::PositiveZ, direction.x, -direction.y, abs.z)
        } else {
            (CubeFace::NegativeZ, -direction.x, -direction.y, abs.z)
        };

        let uv = (Vec2::new(sc, tc) / ma + Vec2::ONE) * 0.5;
        Some((face, uv.clamp(Vec2::ZERO, Vec2::ONE)))
    }
}

/// Six values, one per cube face, addressed by name instead of by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CubeFaces<T> {
    pub positive_x: T,
    pub negative_x: T,
    pub positive_y: T,
    pub negative_y: T,
    pub positive_z: T,
    pub negative_z: T,
}

impl<T> CubeFaces<T> {
    pub fn from_fn(mut f: impl FnMut(CubeFace) -> T) -> Self {
        Self {
            positive_x: f(CubeFace::PositiveX),
            negative_x: f(CubeFace::NegativeX),
            positive_y: f(CubeFace::PositiveY),
            negative_y: f(CubeFace::NegativeY),
            positive_z: f(CubeFace::PositiveZ),
            negative_z: f(CubeFace::NegativeZ),
        }
    }

    #[inline]
    pub fn get(&self, face: CubeFace) -> &T {
        match face {
            CubeFace::PositiveX => &self.positive_x,
            CubeFace::NegativeX => &self.negative_x,
            CubeFace::PositiveY => &self.positive_y,
            CubeFace::NegativeY => &self.negative_y,
            CubeFace::PositiveZ => &self.positive_z,
            CubeFace::NegativeZ => &self.negative_z,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, face: CubeFace) -> &mut T {
        match face {
            CubeFace::PositiveX => &mut self.positive_x,
            CubeFace::NegativeX => &mut self.negative_x,
            CubeFace::PositiveY => &mut self.positive_y,
            CubeFace::NegativeY => &mut self.negative_y,
            CubeFace::PositiveZ => &mut self.positive_z,
            CubeFace::NegativeZ => &mut self.negative_z,
        }
    }

    /// Iterates faces in layer order.
    pub fn iter(&self) -> impl Iterator<Item = (CubeFace, &T)> {
        CubeFace::ALL.into_iter().map(move |face| (face, self.get(face)))
    }

    pub fn map<U>(self, mut f: impl FnMut(CubeFace, T) -> U) -> CubeFaces<U> {
        CubeFaces {
            positive_x: f(CubeFace::PositiveX, self.positive_x),
            negative_x: f(CubeFace::NegativeX, self.negative_x),
            positive_y: f(CubeFace::PositiveY, self.positive_y),
            negative_y: f(CubeFace::NegativeY, self.negative_y),
            positive_z: f(CubeFace::PositiveZ, self.positive_z),
            negative_z: f(CubeFace::NegativeZ, self.negative_z),
        }
    }

    /// Like [`CubeFaces::map`], stopping at the first error in layer order.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(CubeFace, T) -> Result<U, E>,
    ) -> Result<CubeFaces<U>, E> {
        Ok(CubeFaces {
            positive_x: f(CubeFace::PositiveX, self.positive_x)?,
            negative_x: f(CubeFace::NegativeX, self.negative_x)?,
            positive_y: f(CubeFace::PositiveY, self.positive_y)?,
            negative_y: f(CubeFace::NegativeY, self.negative_y)?,
            positive_z: f(CubeFace::PositiveZ, self.positive_z)?,
            negative_z: f(CubeFace::NegativeZ, self.negative_z)?,
        })
    }
}

impl<T> TryFrom<Vec<T>> for CubeFaces<T> {
    type Error = CubeMapError;

    fn try_from(faces: Vec<T>) -> Result<Self, Self::Error> {
        let count = faces.len();
        let [positive_x, negative_x, positive_y, negative_y, positive_z, negative_z]: [T; 6] =
            faces
                .try_into()
                .map_err(|_| CubeMapError::InvalidFaceCount(count))?;

        Ok(Self {
            positive_x,
            negative_x,
            positive_y,
            negative_y,
            positive_z,
            negative_z,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layer_order() {
        for (i, face) in CubeFace::ALL.into_iter().enumerate() {
            assert_eq!(face.layer(), i as u32);
            assert_eq!(CubeFace::from_layer(i as u32), Some(face));
        }
        assert_eq!(CubeFace::from_layer(6), None);
    }

    #[test]
    fn test_project_major_axis() {
        let cases = [
            (Vec3::X, CubeFace::PositiveX),
            (Vec3::NEG_X, CubeFace::NegativeX),
            (Vec3::Y, CubeFace::PositiveY),
            (Vec3::NEG_Y, CubeFace::NegativeY),
            (Vec3::Z, CubeFace::PositiveZ),
            (Vec3::NEG_Z, CubeFace::NegativeZ),
        ];

        for (dir, expected) in cases {
            let (face, uv) = CubeFace::project(dir).unwrap();
            assert_eq!(face, expected);
            assert_eq!(uv, Vec2::splat(0.5));
        }
    }

    #[test]
    fn test_project_corner_uv() {
        // +X face: s runs along -z, t along -y.
        let (face, uv) = CubeFace::project(Vec3::new(1., -0.5, -0.5)).unwrap();
        assert_eq!(face, CubeFace::PositiveX);
        assert_eq!(uv, Vec2::new(0.75, 0.75));
    }

    #[test]
    fn test_project_zero() {
        assert!(CubeFace::project(Vec3::ZERO).is_none());
        assert!(CubeFace::project(Vec3::new(f32::NAN, 0., 1.)).is_none());
    }

    #[test]
    fn test_faces_from_vec() {
        let faces = CubeFaces::try_from(vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(faces.positive_x, 0);
        assert_eq!(faces.negative_z, 5);
        assert_eq!(
            faces.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn test_faces_wrong_count() {
        for count in [0, 1, 5, 7, 12] {
            let err = CubeFaces::try_from(vec![0u8; count]).unwrap_err();
            assert!(matches!(err, CubeMapError::InvalidFaceCount(n) if n == count));
        }
    }

    #[test]
    fn test_try_map_stops_at_first_error() {
        let faces = CubeFaces::from_fn(|face| face.layer());
        let mut visited = Vec::new();
        let result: Result<CubeFaces<u32>, CubeFace> = faces.try_map(|face, v| {
            visited.push(face);
            if face == CubeFace::PositiveY {
                Err(face)
            } else {
                Ok(v)
            }
        });

        assert_eq!(result.unwrap_err(), CubeFace::PositiveY);
        assert_eq!(
            visited,
            vec![CubeFace::PositiveX, CubeFace::NegativeX, CubeFace::PositiveY]
        );
    }
}
