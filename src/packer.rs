//! Compact fixed-width encoding of explicit states.

use std::fmt;

use crate::utils::bits_for_range;

type Bin = u32;
const BIN_BITS: u32 = Bin::BITS;

/// A state packed into bins. Equal states have equal packings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedState(Box<[Bin]>);

impl PackedState {
    pub fn bins(&self) -> &[Bin] {
        &self.0
    }
}

impl fmt::Debug for PackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedState(")?;
        for (i, bin) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:08x}", bin)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Copy, Clone)]
struct Field {
    bin: usize,
    shift: u32,
    /// Unshifted mask of the field's width.
    mask: Bin,
}

/// Maps state vectors to [`PackedState`]s and back.
///
/// Every variable gets a bit field of `ceil(log2(domain))` bits that never
/// straddles two bins. Fields are placed widest first into the first bin
/// with room left.
#[derive(Debug, Clone)]
pub struct StatePacker {
    fields: Vec<Field>,
    num_bins: usize,
}

impl StatePacker {
    pub fn new(domains: &[usize]) -> Self {
        let widths: Vec<u32> = domains.iter().map(|&d| bits_for_range(d)).collect();
        assert!(widths.iter().all(|&w| w <= BIN_BITS), "Domain too large for one bin");

        let mut order: Vec<usize> = (0..domains.len()).collect();
        order.sort_by_key(|&var| std::cmp::Reverse(widths[var]));

        let mut used: Vec<u32> = Vec::new();
        let mut fields = vec![Field { bin: 0, shift: 0, mask: 0 }; domains.len()];
        for var in order {
            let width = widths[var];
            // Single-valued variables take no bits and no bin.
            if width == 0 {
                continue;
            }
            let bin = match used.iter().position(|&u| u + width <= BIN_BITS) {
                Some(bin) => bin,
                None => {
                    used.push(0);
                    used.len() - 1
                }
            };
            let mask = if width == BIN_BITS { Bin::MAX } else { (1 << width) - 1 };
            fields[var] = Field {
                bin,
                shift: used[bin],
                mask,
            };
            used[bin] += width;
        }

        Self {
            fields,
            num_bins: used.len(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.fields.len()
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn bytes_per_state(&self) -> usize {
        self.num_bins * std::mem::size_of::<Bin>()
    }

    pub fn get(&self, state: &PackedState, var: usize) -> i32 {
        let field = self.fields[var];
        if field.mask == 0 {
            return 0;
        }
        ((state.0[field.bin] >> field.shift) & field.mask) as i32
    }

    pub fn set(&self, state: &mut PackedState, var: usize, value: i32) {
        let field = self.fields[var];
        debug_assert!(value >= 0 && (value as Bin) <= field.mask, "Value {} out of range for variable {}", value, var);
        if field.mask == 0 {
            return;
        }
        let bin = &mut state.0[field.bin];
        *bin = (*bin & !(field.mask << field.shift)) | ((value as Bin) << field.shift);
    }

    pub fn pack(&self, values: &[i32]) -> PackedState {
        assert_eq!(values.len(), self.fields.len());
        let mut state = PackedState(vec![0; self.num_bins].into_boxed_slice());
        for (var, &value) in values.iter().enumerate() {
            self.set(&mut state, var, value);
        }
        state
    }

    pub fn unpack(&self, state: &PackedState) -> Vec<i32> {
        (0..self.fields.len()).map(|var| self.get(state, var)).collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_layout_fills_bins() {
        // 20 + 12 bits share one bin, 31 bits need a second, 1 bit fits the second too.
        let packer = StatePacker::new(&[1 << 20, 1 << 12, 1 << 31, 2]);
        assert_eq!(packer.num_bins(), 2);
        assert_eq!(packer.bytes_per_state(), 8);
    }

    #[test]
    fn test_round_trip_exhaustive() {
        let domains = [3, 1, 5, 2];
        let packer = StatePacker::new(&domains);
        let mut seen = std::collections::HashSet::new();
        for a in 0..3 {
            for c in 0..5 {
                for d in 0..2 {
                    let state = vec![a, 0, c, d];
                    let packed = packer.pack(&state);
                    assert_eq!(packer.unpack(&packed), state);
                    assert!(seen.insert(packed));
                }
            }
        }
    }

    #[test]
    fn test_set_leaves_neighbours() {
        let packer = StatePacker::new(&[4, 4, 4]);
        let mut packed = packer.pack(&[3, 0, 3]);
        packer.set(&mut packed, 1, 2);
        assert_eq!(packer.unpack(&packed), vec![3, 2, 3]);
        packer.set(&mut packed, 0, 0);
        assert_eq!(packer.get(&packed, 0), 0);
        assert_eq!(packer.get(&packed, 2), 3);
    }

    #[test]
    fn test_full_width_field() {
        let packer = StatePacker::new(&[1 << 31, (1 << 31) + 1]);
        let state = vec![i32::MAX - 1, i32::MAX];
        assert_eq!(packer.unpack(&packer.pack(&state)), state);
    }

    #[test]
    fn test_single_valued_variable_after_full_bins() {
        // Two 16-bit fields fill the only bin; the constant variable needs none.
        let packer = StatePacker::new(&[1 << 16, 1 << 16, 1]);
        assert_eq!(packer.num_bins(), 1);
        let state = vec![5, 7, 0];
        assert_eq!(packer.unpack(&packer.pack(&state)), state);
    }

    #[test]
    fn test_only_single_valued_variables() {
        let packer = StatePacker::new(&[1, 1]);
        assert_eq!(packer.num_bins(), 0);
        assert_eq!(packer.unpack(&packer.pack(&[0, 0])), vec![0, 0]);
    }
}
