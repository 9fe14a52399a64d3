use std::sync::{Arc, OnceLock};

use crate::encoding::{Encoding, calculate_code_range};

use super::{Rope, RopeKind};

static EMPTY: OnceLock<Vec<Rope>> = OnceLock::new();
static SINGLE_BYTE: OnceLock<Vec<Vec<Rope>>> = OnceLock::new();

impl Rope {
    /// The canonical empty rope for `encoding`.
    pub fn empty(encoding: Encoding) -> Rope {
        let table = EMPTY.get_or_init(|| {
            Encoding::ALL
                .into_iter()
                .map(|encoding| {
                    let code_range = calculate_code_range(encoding, &[]);
                    let bytes: Arc<[u8]> = Arc::from(Vec::new());
                    Rope::from_node(RopeKind::Leaf(bytes), encoding, 0, 1, code_range, Some(0))
                })
                .collect()
        });
        table[encoding.index()].clone()
    }

    /// The canonical one-byte rope for `byte` in `encoding`.
    pub fn single_byte(encoding: Encoding, byte: u8) -> Rope {
        let table = SINGLE_BYTE.get_or_init(|| {
            Encoding::ALL
                .into_iter()
                .map(|encoding| {
                    (0..=u8::MAX)
                        .map(|b| {
                            let code_range = calculate_code_range(encoding, &[b]);
                            let bytes: Arc<[u8]> = Arc::from(vec![b]);
                            Rope::from_node(RopeKind::Leaf(bytes), encoding, 1, 1, code_range, Some(1))
                        })
                        .collect()
                })
                .collect()
        });
        table[encoding.index()][byte as usize].clone()
    }
}
