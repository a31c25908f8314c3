//! Sobol quasi-random sequence generator.
//!
//! Joe-Kuo direction numbers with the Gray-code update, covering the first
//! 51 dimensions (Van der Corput plus 50 table entries). Higher path
//! dimensions are padded with pseudo-randoms by the shock-matrix builder.

use pk_core::Real;

/// Sobol low-discrepancy sequence generator.
pub struct SobolSequence {
    dimension: usize,
    sequence_count: u64,
    int_sequence: Vec<u32>,
    direction_numbers: Vec<Vec<u32>>,
}

impl SobolSequence {
    /// Number of bits used for the direction numbers.
    const BITS: usize = 32;

    /// Dimensions covered by the embedded direction-number table.
    pub const TABLE_DIMENSION: usize = 51;

    /// Create a new Sobol generator of the given dimension, skipping the
    /// first `skip` points. The origin is consumed by the Gray-code update
    /// and never emitted.
    ///
    /// # Panics
    /// Panics when `dimension` exceeds [`Self::TABLE_DIMENSION`].
    pub fn new(dimension: usize, skip: u64) -> Self {
        assert!(
            dimension >= 1 && dimension <= Self::TABLE_DIMENSION,
            "Sobol dimension must be in [1, {}], got {dimension}",
            Self::TABLE_DIMENSION
        );

        let direction_numbers = Self::init_direction_numbers(dimension);
        let int_sequence = vec![0u32; dimension];

        let mut seq = Self {
            dimension,
            sequence_count: 0,
            int_sequence,
            direction_numbers,
        };

        for _ in 0..skip {
            seq.advance();
        }

        seq
    }

    /// Dimension of the generated points.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generate the next quasi-random point in `[0, 1)^d`.
    pub fn next_point(&mut self) -> Vec<Real> {
        self.advance();
        let norm = 2.0_f64.powi(Self::BITS as i32);
        self.int_sequence
            .iter()
            .map(|&v| v as Real / norm)
            .collect()
    }

    /// Gray-code update of the integer sequence.
    fn advance(&mut self) {
        let c = Self::rightmost_zero_bit(self.sequence_count);
        for i in 0..self.dimension {
            self.int_sequence[i] ^= self.direction_numbers[i][c];
        }
        self.sequence_count += 1;
    }

    fn rightmost_zero_bit(n: u64) -> usize {
        let mut n = n;
        let mut pos = 0;
        while n & 1 == 1 {
            n >>= 1;
            pos += 1;
        }
        pos
    }

    /// Initialise direction numbers: dimension 0 is the Van der Corput
    /// sequence, dimensions 1+ use the Joe-Kuo primitive polynomials and
    /// initial direction numbers.
    fn init_direction_numbers(dimension: usize) -> Vec<Vec<u32>> {
        let mut dn = Vec::with_capacity(dimension);

        {
            let mut v = vec![0u32; Self::BITS];
            for (i, slot) in v.iter_mut().enumerate() {
                *slot = 1u32 << (Self::BITS - 1 - i);
            }
            dn.push(v);
        }

        for d in 1..dimension {
            let (degree, poly, initial) = JOE_KUO_TABLE[d - 1];
            let mut v = vec![0u32; Self::BITS];

            for (i, &m) in initial.iter().enumerate() {
                v[i] = m << (Self::BITS - 1 - i);
            }

            for i in degree..Self::BITS {
                v[i] = v[i - degree] ^ (v[i - degree] >> degree);
                for k in 1..degree {
                    if poly & (1 << (degree - 1 - k)) != 0 {
                        v[i] ^= v[i - k];
                    }
                }
            }

            dn.push(v);
        }

        dn
    }
}

/// Joe-Kuo parameters `(degree, polynomial, initial direction numbers)` for
/// dimensions 2..=51, from:
///   S. Joe and F. Y. Kuo, "Constructing Sobol sequences with better
///   two-dimensional projections", SIAM J. Sci. Comput. 30(5), 2008.
const JOE_KUO_TABLE: &[(usize, u32, &[u32])] = &[
    (1, 0, &[1]),
    (2, 1, &[1, 1]),
    (3, 1, &[1, 1, 1]),
    (3, 2, &[1, 3, 1]),
    (4, 1, &[1, 1, 1, 1]),
    (4, 4, &[1, 3, 3, 1]),
    (5, 2, &[1, 1, 1, 3, 3]),
    (5, 4, &[1, 3, 5, 13, 7]),
    (5, 7, &[1, 1, 5, 5, 15]),
    (5, 11, &[1, 3, 1, 7, 9]),
    (5, 13, &[1, 1, 3, 1, 13]),
    (5, 14, &[1, 1, 7, 13, 25]),
    (6, 1, &[1, 3, 7, 5, 29, 17]),
    (6, 13, &[1, 1, 5, 9, 5, 57]),
    (6, 16, &[1, 3, 1, 13, 25, 49]),
    (6, 19, &[1, 1, 3, 7, 17, 23]),
    (6, 22, &[1, 3, 5, 1, 15, 13]),
    (6, 25, &[1, 1, 1, 15, 7, 61]),
    (7, 1, &[1, 3, 1, 3, 5, 43, 79]),
    (7, 4, &[1, 1, 7, 5, 1, 35, 65]),
    (7, 7, &[1, 3, 3, 9, 31, 47, 3]),
    (7, 8, &[1, 1, 5, 7, 11, 15, 93]),
    (7, 14, &[1, 3, 7, 11, 17, 63, 111]),
    (7, 19, &[1, 1, 3, 3, 19, 37, 53]),
    (7, 21, &[1, 3, 1, 5, 5, 55, 99]),
    (7, 28, &[1, 1, 7, 15, 29, 7, 73]),
    (7, 31, &[1, 3, 5, 3, 29, 23, 83]),
    (7, 32, &[1, 1, 1, 9, 15, 39, 13]),
    (7, 37, &[1, 3, 3, 5, 9, 45, 117]),
    (7, 41, &[1, 1, 5, 13, 7, 25, 91]),
    (7, 42, &[1, 3, 7, 1, 19, 51, 97]),
    (7, 50, &[1, 1, 3, 11, 5, 41, 109]),
    (7, 55, &[1, 3, 1, 7, 27, 11, 63]),
    (7, 56, &[1, 1, 7, 3, 21, 33, 75]),
    (7, 59, &[1, 3, 5, 15, 31, 5, 49]),
    (7, 62, &[1, 1, 1, 1, 23, 57, 15]),
    (8, 14, &[1, 3, 3, 13, 3, 19, 111, 235]),
    (8, 21, &[1, 1, 5, 1, 13, 41, 49, 237]),
    (8, 22, &[1, 3, 7, 7, 17, 27, 91, 157]),
    (8, 38, &[1, 1, 3, 9, 1, 53, 55, 69]),
    (8, 47, &[1, 3, 1, 3, 19, 21, 77, 193]),
    (8, 49, &[1, 1, 7, 11, 31, 17, 113, 43]),
    (8, 50, &[1, 3, 5, 5, 5, 63, 19, 213]),
    (8, 52, &[1, 1, 1, 7, 21, 45, 5, 251]),
    (8, 56, &[1, 3, 3, 3, 27, 29, 97, 7]),
    (8, 67, &[1, 1, 5, 15, 7, 7, 43, 195]),
    (8, 69, &[1, 3, 7, 9, 29, 35, 79, 35]),
    (8, 70, &[1, 1, 3, 5, 15, 59, 23, 59]),
    (8, 84, &[1, 3, 1, 11, 1, 25, 121, 85]),
    (8, 87, &[1, 1, 7, 1, 19, 3, 103, 101]),
];
