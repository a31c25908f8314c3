//! American vanilla approximations: Barone-Adesi-Whaley and
//! Bjerksund-Stensland 2002.

use crate::analytic::vanilla::black_scholes_merton;
use pk_core::errors::Result;
use pk_core::{fail, Real};
use pk_math::{bivariate_normal_cdf, normal_cdf, normal_pdf};
use pk_products::CallPut;

/// Which closed-form American approximation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmericanMethod {
    /// Barone-Adesi & Whaley (1987) quadratic approximation.
    BaroneAdesiWhaley,
    /// Bjerksund & Stensland (2002) two-step boundary.
    BjerksundStensland2002,
}

/// American vanilla price by the selected approximation.
#[allow(clippy::too_many_arguments)]
pub fn american_price(
    method: AmericanMethod,
    callput: CallPut,
    s: Real,
    k: Real,
    r: Real,
    q: Real,
    sigma: Real,
    t: Real,
) -> Result<Real> {
    match method {
        AmericanMethod::BaroneAdesiWhaley => baw(callput, s, k, r, q, sigma, t),
        AmericanMethod::BjerksundStensland2002 => match callput {
            CallPut::Call => bs2002_call(s, k, r, r - q, sigma, t),
            // Put via the Bjerksund-Stensland transformation:
            // P(S, K, r, b) = C(K, S, r − b, −b)
            CallPut::Put => bs2002_call(k, s, r - (r - q), -(r - q), sigma, t),
        },
    }
}

// ── Barone-Adesi-Whaley ──────────────────────────────────────────────────────

fn baw(callput: CallPut, s: Real, k: Real, r: Real, q: Real, sigma: Real, t: Real) -> Result<Real> {
    let b = r - q;
    let (european, ..) = black_scholes_merton(callput, s, k, r, q, sigma, t);

    // An American call on an asset with no income is never exercised early.
    if callput == CallPut::Call && b >= r {
        return Ok(european);
    }

    let sigma2 = sigma * sigma;
    let m = 2.0 * r / sigma2;
    let n = 2.0 * b / sigma2;
    let k_factor = 1.0 - (-r * t).exp();
    let disc = ((n - 1.0) * (n - 1.0) + 4.0 * m / k_factor).sqrt();

    match callput {
        CallPut::Call => {
            let q2 = (-(n - 1.0) + disc) / 2.0;
            let s_star = critical_price(callput, k, r, q, sigma, t, q2)?;
            if s >= s_star {
                return Ok(s - k);
            }
            let d1 = bs_d1(s_star, k, b, sigma, t);
            let a2 = (s_star / q2) * (1.0 - (-q * t).exp() * normal_cdf(d1));
            Ok(european + a2 * (s / s_star).powf(q2))
        }
        CallPut::Put => {
            let q1 = (-(n - 1.0) - disc) / 2.0;
            let s_star = critical_price(callput, k, r, q, sigma, t, q1)?;
            if s <= s_star {
                return Ok(k - s);
            }
            let d1 = bs_d1(s_star, k, b, sigma, t);
            let a1 = -(s_star / q1) * (1.0 - (-q * t).exp() * normal_cdf(-d1));
            Ok(european + a1 * (s / s_star).powf(q1))
        }
    }
}

fn bs_d1(s: Real, k: Real, b: Real, sigma: Real, t: Real) -> Real {
    ((s / k).ln() + (b + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Newton iteration for the early-exercise boundary.
fn critical_price(
    callput: CallPut,
    k: Real,
    r: Real,
    q: Real,
    sigma: Real,
    t: Real,
    q_exp: Real,
) -> Result<Real> {
    let b = r - q;
    let phi = callput.sign();
    // Seed from the perpetual boundary
    let mut s = match callput {
        CallPut::Call => k * 1.5,
        CallPut::Put => k * 0.7,
    };

    for _ in 0..100 {
        let (european, ..) = black_scholes_merton(callput, s, k, r, q, sigma, t);
        let d1 = bs_d1(s, k, b, sigma, t);
        let df_q = (-q * t).exp();
        // Boundary condition: φ(S − K) = european + φ(1 − df_q·N(φd1))·S/q_exp
        let n_phi_d1 = normal_cdf(phi * d1);
        let g = phi * (s - k) - european - phi * (1.0 - df_q * n_phi_d1) * s / q_exp;
        let dg = phi - phi * df_q * n_phi_d1 - phi * (1.0 - df_q * n_phi_d1) / q_exp
            + df_q * normal_pdf(d1) / (sigma * t.sqrt()) / q_exp;
        let step = g / dg;
        s -= step;
        if s <= 0.0 {
            s = k * 1e-3;
        }
        if step.abs() < 1e-8 * k {
            return Ok(s);
        }
    }
    fail!(Numerical, "BAW early-exercise boundary did not converge");
}

// ── Bjerksund-Stensland 2002 ─────────────────────────────────────────────────

/// BS2002 American call with cost of carry `b` (= r − q).
fn bs2002_call(s: Real, k: Real, r: Real, b: Real, sigma: Real, t: Real) -> Result<Real> {
    if b >= r {
        // Never exercised early
        let (price, ..) = black_scholes_merton(CallPut::Call, s, k, r, r - b, sigma, t);
        return Ok(price);
    }

    let v2 = sigma * sigma;
    let beta = (0.5 - b / v2) + ((b / v2 - 0.5) * (b / v2 - 0.5) + 2.0 * r / v2).sqrt();
    if !beta.is_finite() || beta <= 1.0 {
        fail!(Numerical, "Bjerksund-Stensland exponent degenerate: beta = {beta}");
    }
    let b_inf = beta / (beta - 1.0) * k;
    let b0 = if (r - b).abs() > 1e-12 {
        k.max(r / (r - b) * k)
    } else {
        k
    };

    let t1 = 0.5 * (5.0_f64.sqrt() - 1.0) * t;
    let h1 = -(b * t1 + 2.0 * sigma * t1.sqrt()) * k * k / ((b_inf - b0) * b0);
    let h2 = -(b * t + 2.0 * sigma * t.sqrt()) * k * k / ((b_inf - b0) * b0);
    let i1 = b0 + (b_inf - b0) * (1.0 - h1.exp());
    let i2 = b0 + (b_inf - b0) * (1.0 - h2.exp());
    let alpha1 = (i1 - k) * i1.powf(-beta);
    let alpha2 = (i2 - k) * i2.powf(-beta);

    if s >= i2 {
        return Ok(s - k);
    }

    let price = alpha2 * s.powf(beta) - alpha2 * phi(s, t1, beta, i2, i2, r, b, sigma)
        + phi(s, t1, 1.0, i2, i2, r, b, sigma)
        - phi(s, t1, 1.0, i1, i2, r, b, sigma)
        - k * phi(s, t1, 0.0, i2, i2, r, b, sigma)
        + k * phi(s, t1, 0.0, i1, i2, r, b, sigma)
        + alpha1 * phi(s, t1, beta, i1, i2, r, b, sigma)
        - alpha1 * psi(s, t, beta, i1, i2, i1, t1, r, b, sigma)
        + psi(s, t, 1.0, i1, i2, i1, t1, r, b, sigma)
        - psi(s, t, 1.0, k, i2, i1, t1, r, b, sigma)
        - k * psi(s, t, 0.0, i1, i2, i1, t1, r, b, sigma)
        + k * psi(s, t, 0.0, k, i2, i1, t1, r, b, sigma);

    // The approximation is a lower bound; never report below European.
    let (european, ..) = black_scholes_merton(CallPut::Call, s, k, r, r - b, sigma, t);
    Ok(price.max(european))
}

#[allow(clippy::too_many_arguments)]
fn phi(s: Real, t: Real, gamma: Real, h: Real, i: Real, r: Real, b: Real, sigma: Real) -> Real {
    let v2 = sigma * sigma;
    let lambda = (-r + gamma * b + 0.5 * gamma * (gamma - 1.0) * v2) * t;
    let d = -((s / h).ln() + (b + (gamma - 0.5) * v2) * t) / (sigma * t.sqrt());
    let kappa = 2.0 * b / v2 + 2.0 * gamma - 1.0;
    lambda.exp()
        * s.powf(gamma)
        * (normal_cdf(d) - (i / s).powf(kappa) * normal_cdf(d - 2.0 * (i / s).ln() / (sigma * t.sqrt())))
}

#[allow(clippy::too_many_arguments)]
fn psi(
    s: Real,
    t2: Real,
    gamma: Real,
    h: Real,
    i2: Real,
    i1: Real,
    t1: Real,
    r: Real,
    b: Real,
    sigma: Real,
) -> Real {
    let v2 = sigma * sigma;
    let drift = b + (gamma - 0.5) * v2;
    let st1 = sigma * t1.sqrt();
    let st2 = sigma * t2.sqrt();

    let e1 = ((s / i1).ln() + drift * t1) / st1;
    let e2 = ((i2 * i2 / (s * i1)).ln() + drift * t1) / st1;
    let e3 = ((s / i1).ln() - drift * t1) / st1;
    let e4 = ((i2 * i2 / (s * i1)).ln() - drift * t1) / st1;

    let f1 = ((s / h).ln() + drift * t2) / st2;
    let f2 = ((i2 * i2 / (s * h)).ln() + drift * t2) / st2;
    let f3 = ((i1 * i1 / (s * h)).ln() + drift * t2) / st2;
    let f4 = ((s * i1 * i1 / (h * i2 * i2)).ln() + drift * t2) / st2;

    let rho = (t1 / t2).sqrt();
    let lambda = -r + gamma * b + 0.5 * gamma * (gamma - 1.0) * v2;
    let kappa = 2.0 * b / v2 + 2.0 * gamma - 1.0;

    (lambda * t2).exp()
        * s.powf(gamma)
        * (bivariate_normal_cdf(-e1, -f1, rho)
            - (i2 / s).powf(kappa) * bivariate_normal_cdf(-e2, -f2, rho)
            - (i1 / s).powf(kappa) * bivariate_normal_cdf(-e3, -f3, -rho)
            + (i1 / i2).powf(kappa) * bivariate_normal_cdf(-e4, -f4, -rho))
}
