//! Generalized scattering matrices and their cascade.
//!
//! A [`Gsm`] relates outgoing to incoming modal amplitudes on the two ports
//! of a block. Port 1 faces region 1 (left), port 2 faces region N (right):
//!
//! $$
//! \begin{pmatrix}\mathbf{b}_1\\ \mathbf{b}_2\end{pmatrix} =
//! \begin{pmatrix}\mathbf{S}_{11} & \mathbf{S}_{12}\\ \mathbf{S}_{21} & \mathbf{S}_{22}\end{pmatrix}
//! \begin{pmatrix}\mathbf{a}_1\\ \mathbf{a}_2\end{pmatrix}
//! $$
//!
//! Amplitudes are power-normalised: a mode of amplitude $a$ in a medium of
//! modal admittance $Y$ carries transverse field $a/\sqrt{Y}$.

use ndarray::{s, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::solver::direct::LuFactor;
use crate::solver::SolverError;

/// A two-port generalized scattering matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gsm {
    /// Reflection at port 1, `n1 × n1`.
    pub s11: Array2<Complex64>,
    /// Transmission from port 2 to port 1, `n1 × n2`.
    pub s12: Array2<Complex64>,
    /// Transmission from port 1 to port 2, `n2 × n1`.
    pub s21: Array2<Complex64>,
    /// Reflection at port 2, `n2 × n2`.
    pub s22: Array2<Complex64>,
}

impl Gsm {
    pub fn zeros(n1: usize, n2: usize) -> Self {
        Self {
            s11: Array2::zeros((n1, n1)),
            s12: Array2::zeros((n1, n2)),
            s21: Array2::zeros((n2, n1)),
            s22: Array2::zeros((n2, n2)),
        }
    }

    /// A reference plane with nothing on it: full transmission of the common
    /// modes.
    pub fn identity(n: usize) -> Self {
        Self {
            s11: Array2::zeros((n, n)),
            s12: Array2::eye(n),
            s21: Array2::eye(n),
            s22: Array2::zeros((n, n)),
        }
    }

    /// A perfectly conducting, unperforated screen.
    pub fn short(n1: usize, n2: usize) -> Self {
        let mut g = Self::zeros(n1, n2);
        g.s11.diag_mut().fill(Complex64::new(-1.0, 0.0));
        g.s22.diag_mut().fill(Complex64::new(-1.0, 0.0));
        g
    }

    /// Bare dielectric junction between media of modal admittances `y1`
    /// (left) and `y2` (right).
    ///
    /// Both slices must cover `max(n1, n2)` modes: a mode carried on one side
    /// only is reflected as if the other medium terminated it in a matched
    /// load.
    pub fn junction(y1: &[Complex64], y2: &[Complex64], n1: usize, n2: usize) -> Self {
        let mut g = Self::zeros(n1, n2);
        for p in 0..n1.max(n2) {
            let sum = y1[p] + y2[p];
            let gamma = (y1[p] - y2[p]) / sum;
            if p < n1 {
                g.s11[[p, p]] = gamma;
            }
            if p < n2 {
                g.s22[[p, p]] = -gamma;
            }
            if p < n1 && p < n2 {
                let tau = 2.0 * (y1[p] * y2[p]).sqrt() / sum;
                g.s12[[p, p]] = tau;
                g.s21[[p, p]] = tau;
            }
        }
        g
    }

    /// Number of modes at port 1.
    pub fn n1(&self) -> usize {
        self.s11.nrows()
    }

    /// Number of modes at port 2.
    pub fn n2(&self) -> usize {
        self.s22.nrows()
    }

    /// Move port 2 through a layer of thickness `width` whose modes have
    /// propagation constants `gamma` (at least `n2` of them).
    ///
    /// With $\mathbf{P} = \mathrm{diag}(e^{-\gamma_p w})$:
    /// $\mathbf{S}_{12}\mathbf{P}$, $\mathbf{P}\mathbf{S}_{21}$, $\mathbf{P}\mathbf{S}_{22}\mathbf{P}$.
    pub fn propagate(&mut self, gamma: &[Complex64], width: f64) {
        let phase: Vec<Complex64> = gamma[..self.n2()].iter().map(|g| (-g * width).exp()).collect();
        for (q, p) in phase.iter().enumerate() {
            self.s12.column_mut(q).mapv_inplace(|z| z * p);
            self.s21.row_mut(q).mapv_inplace(|z| z * p);
        }
        for ((r, c), z) in self.s22.indexed_iter_mut() {
            *z *= phase[r] * phase[c];
        }
    }

    /// Redheffer star product: `self` on the left, `right` on the right.
    ///
    /// $$
    /// \begin{aligned}
    /// \mathbf{S}_{11} &= \mathbf{A}_{11} + \mathbf{A}_{12}\mathbf{B}_{11}(\mathbf{I} - \mathbf{A}_{22}\mathbf{B}_{11})^{-1}\mathbf{A}_{21} \\
    /// \mathbf{S}_{12} &= \mathbf{A}_{12}(\mathbf{I} - \mathbf{B}_{11}\mathbf{A}_{22})^{-1}\mathbf{B}_{12} \\
    /// \mathbf{S}_{21} &= \mathbf{B}_{21}(\mathbf{I} - \mathbf{A}_{22}\mathbf{B}_{11})^{-1}\mathbf{A}_{21} \\
    /// \mathbf{S}_{22} &= \mathbf{B}_{22} + \mathbf{B}_{21}(\mathbf{I} - \mathbf{A}_{22}\mathbf{B}_{11})^{-1}\mathbf{A}_{22}\mathbf{B}_{12}
    /// \end{aligned}
    /// $$
    pub fn cascade(&self, right: &Gsm) -> Result<Gsm, SolverError> {
        let n = self.n2();
        if right.n1() != n {
            return Err(SolverError::DimensionMismatch(format!(
                "cannot cascade a GSM with {} right-port modes onto one with {} left-port modes",
                n,
                right.n1()
            )));
        }
        let eye = Array2::<Complex64>::eye(n);

        let m = LuFactor::new(&(&eye - &self.s22.dot(&right.s11)))?;
        let x = m.solve(&self.s21)?;
        let s11 = &self.s11 + &self.s12.dot(&right.s11).dot(&x);
        let s21 = right.s21.dot(&x);
        let s22 = &right.s22 + &right.s21.dot(&m.solve(&self.s22.dot(&right.s12))?);

        let mirror = LuFactor::new(&(&eye - &right.s11.dot(&self.s22)))?;
        let s12 = self.s12.dot(&mirror.solve(&right.s12)?);

        Ok(Gsm { s11, s12, s21, s22 })
    }

    /// Shift the scatterer laterally by `offset` (m):
    /// $S_{pq} \to S_{pq}\,e^{j(\boldsymbol\beta_p - \boldsymbol\beta_q)\cdot\mathbf{d}}$.
    ///
    /// `betas[p]` is the transverse wavevector of mode `p`; it must cover the
    /// larger of the two port mode counts.
    pub fn translate(&self, betas: &[[f64; 2]], offset: [f64; 2]) -> Gsm {
        if offset == [0.0, 0.0] {
            return self.clone();
        }
        let phase: Vec<Complex64> = betas
            .iter()
            .map(|b| Complex64::new(0.0, b[0] * offset[0] + b[1] * offset[1]).exp())
            .collect();
        let shift = |block: &Array2<Complex64>| {
            Array2::from_shape_fn(block.dim(), |(p, q)| block[[p, q]] * phase[p] * phase[q].conj())
        };
        Gsm {
            s11: shift(&self.s11),
            s12: shift(&self.s12),
            s21: shift(&self.s21),
            s22: shift(&self.s22),
        }
    }

    /// The dominant-mode (first two modes) sub-blocks.
    pub fn dominant(&self) -> Gsm {
        let d1 = self.n1().min(2);
        let d2 = self.n2().min(2);
        Gsm {
            s11: self.s11.slice(s![..d1, ..d1]).to_owned(),
            s12: self.s12.slice(s![..d1, ..d2]).to_owned(),
            s21: self.s21.slice(s![..d2, ..d1]).to_owned(),
            s22: self.s22.slice(s![..d2, ..d2]).to_owned(),
        }
    }

    /// Block `(i, j)` with 1-based region numbers: 1 is port 1, 2 is port 2.
    pub fn block(&self, i: usize, j: usize) -> Option<&Array2<Complex64>> {
        match (i, j) {
            (1, 1) => Some(&self.s11),
            (1, 2) => Some(&self.s12),
            (2, 1) => Some(&self.s21),
            (2, 2) => Some(&self.s22),
            _ => None,
        }
    }
}
