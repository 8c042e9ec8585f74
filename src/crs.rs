//! Coordinate reference system seam.
//!
//! CRS math lives outside this crate. The session only needs to move a
//! point and an extent from one CRS to another, so that is all the
//! [`Reprojector`] trait asks for.

use glam::DVec2;

use crate::entities::transform::Extent;
use crate::error::{GeorefError, Result};

/// Moves map coordinates between two CRSs identified by string ids.
pub trait Reprojector {
    fn reproject_point(&self, from: &str, to: &str, p: DVec2) -> Result<DVec2>;

    /// Reproject an extent. The default maps all four corners and takes
    /// their bounding box.
    fn reproject_extent(&self, from: &str, to: &str, extent: &Extent) -> Result<Extent> {
        let corners = [
            extent.min,
            DVec2::new(extent.max.x, extent.min.y),
            extent.max,
            DVec2::new(extent.min.x, extent.max.y),
        ];
        let mut out = Vec::with_capacity(4);
        for c in corners {
            out.push(self.reproject_point(from, to, c)?);
        }
        Ok(Extent::from_points(&out))
    }
}

/// Same CRS ids compare equal ignoring ASCII case and surrounding spaces.
pub fn same_crs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Reprojector with no transformation database: identical CRSs pass
/// through, anything else fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReprojector;

impl Reprojector for IdentityReprojector {
    fn reproject_point(&self, from: &str, to: &str, p: DVec2) -> Result<DVec2> {
        if same_crs(from, to) {
            Ok(p)
        } else {
            Err(GeorefError::Reprojection {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}
