//! Unstructured triangular-mesh topology and host-element location.
//!
//! The mesh is immutable after construction: nodes, elements, neighbour
//! topology, terrain-following level/layer coordinates, and the
//! least-squares interpolation weights never change once loaded. Particle
//! tracking never mutates a `Mesh`; only the field snapshots bound to it
//! (see `field.rs`) change between timesteps.

/// Vertices per element. A fixed constant (not a runtime parameter) so
/// per-particle scratch arrays (barycentric weights, stage buffers) live on
/// the stack rather than the heap.
pub const N_VERTICES: usize = 3;

/// Element-centres used by the LLS / Shepard horizontal interpolants: the
/// host element plus its three edge neighbours.
pub const N_NEIGH_ELEMS: usize = 4;

/// Numerical edge policy for "is this point inside the triangle": a point
/// with all barycentric weights at least `-EPS_INSIDE` counts as inside, so
/// that round-off at a shared edge doesn't bounce a particle between two
/// elements forever.
pub const EPS_INSIDE: f64 = 1e-10;

/// What lies across an element edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeNeighbor {
    Element(usize),
    Land,
    Open,
}

impl EdgeNeighbor {
    fn from_raw(raw: i64) -> Self {
        match raw {
            -1 => EdgeNeighbor::Land,
            -2 => EdgeNeighbor::Open,
            n if n >= 0 => EdgeNeighbor::Element(n as usize),
            n => panic!("invalid nbe entry {n}: must be >= -2"),
        }
    }
}

/// Outcome of walking the mesh towards a target point.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSearchOutcome {
    Found { host: usize, phi: [f64; 3] },
    LandCross,
    OpenCross,
    SearchFail,
}

/// Immutable unstructured triangular mesh with terrain-following vertical
/// coordinates, as described in the data model: node/element arrays,
/// neighbour topology, and the LLS weights used to interpolate
/// element-centred vector fields across a triangle.
pub struct Mesh {
    n_elems: usize,
    n_nodes: usize,
    /// Node indices per triangle, `nv[e] = [n0, n1, n2]`, consistent orientation.
    nv: Vec<[usize; N_VERTICES]>,
    /// Neighbour across each edge, indexed the same way as `nv`: `nbe[e][i]`
    /// is the neighbour across the edge opposite vertex `i`.
    nbe: Vec<[EdgeNeighbor; N_VERTICES]>,
    x: Vec<f64>,
    y: Vec<f64>,
    xc: Vec<f64>,
    yc: Vec<f64>,
    /// `siglev[k][node]`, levels (interfaces), monotonically decreasing with `k`, in `[-1, 0]`.
    siglev: Vec<Vec<f64>>,
    /// `siglay[k][node]`, layers (cell centres), monotonically decreasing with `k`, in `[-1, 0]`.
    siglay: Vec<Vec<f64>>,
    /// Static bathymetry at nodes [m], positive downward.
    h: Vec<f64>,
    /// LLS coefficients for element-centred vector fields, index 0 is the host itself.
    a1u: Vec<[f64; N_NEIGH_ELEMS]>,
    a2u: Vec<[f64; N_NEIGH_ELEMS]>,
}

impl Mesh {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nv: Vec<[usize; N_VERTICES]>,
        nbe_raw: Vec<[i64; N_VERTICES]>,
        x: Vec<f64>,
        y: Vec<f64>,
        siglev: Vec<Vec<f64>>,
        siglay: Vec<Vec<f64>>,
        h: Vec<f64>,
        a1u: Vec<[f64; N_NEIGH_ELEMS]>,
        a2u: Vec<[f64; N_NEIGH_ELEMS]>,
    ) -> Self {
        let n_elems = nv.len();
        let n_nodes = x.len();
        let nbe: Vec<[EdgeNeighbor; N_VERTICES]> = nbe_raw
            .into_iter()
            .map(|edges| std::array::from_fn(|i| EdgeNeighbor::from_raw(edges[i])))
            .collect();

        let mut xc = Vec::with_capacity(n_elems);
        let mut yc = Vec::with_capacity(n_elems);
        for tri in &nv {
            let cx = (x[tri[0]] + x[tri[1]] + x[tri[2]]) / 3.0;
            let cy = (y[tri[0]] + y[tri[1]] + y[tri[2]]) / 3.0;
            xc.push(cx);
            yc.push(cy);
        }

        Mesh {
            n_elems,
            n_nodes,
            nv,
            nbe,
            x,
            y,
            xc,
            yc,
            siglev,
            siglay,
            h,
            a1u,
            a2u,
        }
    }

    pub fn n_elems(&self) -> usize {
        self.n_elems
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn nodes_of(&self, elem: usize) -> [usize; N_VERTICES] {
        self.nv[elem]
    }

    pub fn neighbor(&self, elem: usize, edge: usize) -> EdgeNeighbor {
        self.nbe[elem][edge]
    }

    pub fn centroid(&self, elem: usize) -> (f64, f64) {
        (self.xc[elem], self.yc[elem])
    }

    pub fn node_xy(&self, node: usize) -> (f64, f64) {
        (self.x[node], self.y[node])
    }

    pub fn bathymetry(&self, node: usize) -> f64 {
        self.h[node]
    }

    pub fn siglev(&self) -> &[Vec<f64>] {
        &self.siglev
    }

    pub fn siglay(&self) -> &[Vec<f64>] {
        &self.siglay
    }

    pub fn lls_weights(&self, elem: usize) -> ([f64; N_NEIGH_ELEMS], [f64; N_NEIGH_ELEMS]) {
        (self.a1u[elem], self.a2u[elem])
    }

    /// Triangle area ratios of `(x, y)` with respect to element `elem`'s
    /// three vertices. `phi[i] >= 0` iff the point lies on the inward side
    /// of the edge opposite vertex `i`; `sum(phi) == 1` by construction.
    pub fn barycentric(&self, x: f64, y: f64, elem: usize) -> [f64; 3] {
        let [n0, n1, n2] = self.nv[elem];
        let (x0, y0) = (self.x[n0], self.y[n0]);
        let (x1, y1) = (self.x[n1], self.y[n1]);
        let (x2, y2) = (self.x[n2], self.y[n2]);

        let area_total = (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0);
        let area0 = (x1 - x) * (y2 - y) - (x2 - x) * (y1 - y);
        let area1 = (x2 - x) * (y0 - y) - (x0 - x) * (y2 - y);
        let area2 = (x0 - x) * (y1 - y) - (x1 - x) * (y0 - y);

        [area0 / area_total, area1 / area_total, area2 / area_total]
    }

    /// Reconstruct `(x, y)` from barycentric weights; used by the
    /// round-trip invariant test.
    pub fn reconstruct(&self, phi: [f64; 3], elem: usize) -> (f64, f64) {
        let [n0, n1, n2] = self.nv[elem];
        let x = phi[0] * self.x[n0] + phi[1] * self.x[n1] + phi[2] * self.x[n2];
        let y = phi[0] * self.y[n0] + phi[1] * self.y[n1] + phi[2] * self.y[n2];
        (x, y)
    }

    /// Number of edges of `elem` that border land (`nbe == -1`).
    fn count_land_edges(&self, elem: usize) -> usize {
        self.nbe[elem]
            .iter()
            .filter(|n| matches!(n, EdgeNeighbor::Land))
            .count()
    }

    /// Edge-tie rule: among the edges tied for the minimum barycentric
    /// weight, prefer a neighbour that is not land, then one that is not
    /// open; if both candidates are open, take the lower edge index.
    fn pick_crossed_edge(&self, phi: &[f64; 3], elem: usize) -> usize {
        let min_val = phi.iter().cloned().fold(f64::INFINITY, f64::min);
        let tied: Vec<usize> = (0..3)
            .filter(|&i| (phi[i] - min_val).abs() <= f64::EPSILON)
            .collect();
        if tied.len() == 1 {
            return tied[0];
        }
        tied.into_iter()
            .min_by_key(|&i| match self.nbe[elem][i] {
                EdgeNeighbor::Element(_) => 0,
                EdgeNeighbor::Open => 1,
                EdgeNeighbor::Land => 2,
            })
            .expect("tied edge list is never empty")
    }

    /// Walk from `start_elem` towards `(x, y)`, crossing at most
    /// `max_walk_steps` edges. See spec §4.A for the full contract,
    /// including the two-land-boundary rejection and the edge-tie rule.
    pub fn find_host_local(
        &self,
        start_elem: usize,
        x: f64,
        y: f64,
        max_walk_steps: usize,
    ) -> HostSearchOutcome {
        let mut current = start_elem;
        for step in 0..=max_walk_steps {
            let phi = self.barycentric(x, y, current);
            if phi.iter().all(|&p| p >= -EPS_INSIDE) {
                if self.count_land_edges(current) >= 2 {
                    return HostSearchOutcome::LandCross;
                }
                return HostSearchOutcome::Found { host: current, phi };
            }

            let edge = self.pick_crossed_edge(&phi, current);
            match self.nbe[current][edge] {
                EdgeNeighbor::Land => return HostSearchOutcome::LandCross,
                EdgeNeighbor::Open => return HostSearchOutcome::OpenCross,
                EdgeNeighbor::Element(next) => {
                    if step > 0 && next == start_elem {
                        return HostSearchOutcome::SearchFail;
                    }
                    current = next;
                }
            }
        }
        HostSearchOutcome::SearchFail
    }

    /// `O(N_elems)` scan for the host of `(x, y)`, used to bootstrap seeds
    /// and to recover from a failed local walk.
    pub fn find_host_global(&self, x: f64, y: f64) -> HostSearchOutcome {
        for elem in 0..self.n_elems {
            let phi = self.barycentric(x, y, elem);
            if phi.iter().all(|&p| p >= -EPS_INSIDE) {
                if self.count_land_edges(elem) >= 2 {
                    continue;
                }
                return HostSearchOutcome::Found { host: elem, phi };
            }
        }
        HostSearchOutcome::SearchFail
    }
}
