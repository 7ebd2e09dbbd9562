use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Side length of a square holding exactly `count` cells, if there is one.
pub fn exact_side(count: usize) -> Option<usize> {
    let mut side = (count as f64).sqrt() as usize;
    // f64 rounding can land one off for very large counts
    while side * side > count {
        side -= 1;
    }
    while (side + 1) * (side + 1) <= count {
        side += 1;
    }
    (side * side == count).then_some(side)
}

/// Dense N x N table indexed by `(src, dst)`, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T> SquareMatrix<T> {
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(size * size);
        for src in 0..size {
            for dst in 0..size {
                cells.push(f(src, dst));
            }
        }
        Self { size, cells }
    }

    /// Wraps row-major cells; `None` when the cell count is not `size * size`.
    pub fn from_row_major(size: usize, cells: Vec<T>) -> Option<Self> {
        (cells.len() == size * size).then_some(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, src: usize, dst: usize) -> Option<&T> {
        if src < self.size && dst < self.size {
            self.cells.get(src * self.size + dst)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, src: usize, dst: usize) -> Option<&mut T> {
        if src < self.size && dst < self.size {
            self.cells.get_mut(src * self.size + dst)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i / size, i % size), cell))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = ((usize, usize), &mut T)> {
        let size = self.size;
        self.cells
            .iter_mut()
            .enumerate()
            .map(move |(i, cell)| ((i / size, i % size), cell))
    }

    pub fn into_map<U>(self, f: impl FnMut(T) -> U) -> SquareMatrix<U> {
        SquareMatrix {
            size: self.size,
            cells: self.cells.into_iter().map(f).collect(),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> SquareMatrix<U> {
        SquareMatrix {
            size: self.size,
            cells: self.cells.iter().map(&mut f).collect(),
        }
    }
}

impl<T> Index<(usize, usize)> for SquareMatrix<T> {
    type Output = T;

    fn index(&self, (src, dst): (usize, usize)) -> &T {
        assert!(
            src < self.size && dst < self.size,
            "cell ({src}, {dst}) outside {0}x{0}",
            self.size
        );
        &self.cells[src * self.size + dst]
    }
}

impl<T> IndexMut<(usize, usize)> for SquareMatrix<T> {
    fn index_mut(&mut self, (src, dst): (usize, usize)) -> &mut T {
        assert!(
            src < self.size && dst < self.size,
            "cell ({src}, {dst}) outside {0}x{0}",
            self.size
        );
        &mut self.cells[src * self.size + dst]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_side_accepts_only_perfect_squares() {
        assert_eq!(exact_side(0), Some(0));
        assert_eq!(exact_side(1), Some(1));
        assert_eq!(exact_side(196), Some(14));
        assert_eq!(exact_side(2), None);
        assert_eq!(exact_side(15), None);
        assert_eq!(exact_side(197), None);
    }

    #[test]
    fn row_major_layout() {
        let m = SquareMatrix::from_row_major(2, vec!["a", "b", "c", "d"]).unwrap();
        assert_eq!(m[(0, 1)], "b");
        assert_eq!(m[(1, 0)], "c");
        assert_eq!(m.get(2, 0), None);
        assert!(SquareMatrix::from_row_major(2, vec![1, 2, 3]).is_none());

        let cells: Vec<_> = m.iter().map(|(pos, v)| (pos, *v)).collect();
        assert_eq!(cells[3], ((1, 1), "d"));
    }
}
