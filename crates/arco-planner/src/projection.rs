//! Feasibility projection of the pooled consensus variables
//!
//! The orchestrator pools, per knot, the state, contact, and control
//! primal+dual sums into one vector of dimension
//! `state_dim + 2 + control_dim` and hands knots 0..N-1 to a projection
//! block. The terminal knot never reaches the projector.

use nalgebra::DMatrix;

use crate::config::{Saturation, StateLayout};

/// Projection of the pooled matrix onto the feasible set
///
/// Input and output are `pooled_dim × N` (knots 0..N-1). The output must
/// satisfy the saturation bounds componentwise on the state and control
/// sub-vectors; the contact sub-block is preserved unless a contact
/// feasibility rule is composed in.
pub trait ProjectionBlock {
    fn project(
        &self,
        pooled: &DMatrix<f64>,
        limits: &Saturation,
        layout: &StateLayout,
    ) -> DMatrix<f64>;
}

/// Componentwise clamp onto the box `[lower, upper]`
///
/// State and control components are clipped independently; the contact
/// rows pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct BoxProjection;

impl ProjectionBlock for BoxProjection {
    fn project(
        &self,
        pooled: &DMatrix<f64>,
        limits: &Saturation,
        layout: &StateLayout,
    ) -> DMatrix<f64> {
        let mut out = pooled.clone();
        let s = layout.state_dim();
        let contact_end = s + layout.contact_dim();

        for j in 0..out.ncols() {
            for i in 0..s {
                out[(i, j)] = out[(i, j)].clamp(limits.state_limits[(0, i)], limits.state_limits[(1, i)]);
            }
            for (u, i) in (contact_end..out.nrows()).enumerate() {
                out[(i, j)] =
                    out[(i, j)].clamp(limits.control_limits[(0, u)], limits.control_limits[(1, u)]);
            }
        }
        out
    }
}

/// Identity projection, useful for tests and unconstrained problems
#[derive(Debug, Clone, Default)]
pub struct IdentityProjection;

impl ProjectionBlock for IdentityProjection {
    fn project(
        &self,
        pooled: &DMatrix<f64>,
        _limits: &Saturation,
        _layout: &StateLayout,
    ) -> DMatrix<f64> {
        pooled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_projection_clamps_state_and_control() {
        let layout = StateLayout::default();
        let limits = Saturation::uniform(&layout, 1.0, 0.5, 2.0, 3.0);
        let projection = BoxProjection;

        let pooled = DMatrix::from_element(layout.pooled_dim(), 4, 100.0);
        let out = projection.project(&pooled, &limits, &layout);

        // Joint angle row clipped to 1.0, velocity to 0.5, force to 2.0
        assert_relative_eq!(out[(0, 0)], 1.0);
        assert_relative_eq!(out[(7, 1)], 0.5);
        assert_relative_eq!(out[(14, 2)], 2.0);
        // Contact rows preserved
        assert_relative_eq!(out[(17, 0)], 100.0);
        assert_relative_eq!(out[(18, 3)], 100.0);
        // Control rows clipped to 3.0
        assert_relative_eq!(out[(19, 0)], 3.0);
        assert_relative_eq!(out[(25, 3)], 3.0);
    }

    #[test]
    fn test_box_projection_leaves_interior_points() {
        let layout = StateLayout::default();
        let limits = Saturation::uniform(&layout, 10.0, 10.0, 10.0, 10.0);
        let projection = BoxProjection;

        let pooled = DMatrix::from_fn(layout.pooled_dim(), 3, |i, j| (i + j) as f64 * 0.01);
        let out = projection.project(&pooled, &limits, &layout);
        assert_relative_eq!(out, pooled);
    }
}
