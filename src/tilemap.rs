/// A bounded 2D grid stored row-major. Battlemaps do not wrap at the edges.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

/// Offsets of the 8 neighbours, clockwise from north.
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Offsets of the 4 orthogonal neighbours.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

impl<T> Tilemap<T> {
    /// Build from a row-major vector; `None` if the length is wrong.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == width * height).then_some(Self { width, height, data })
    }

    /// Build by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Get a cell by signed coordinates, `None` when outside the map.
    pub fn get_checked(&self, x: i32, y: i32) -> Option<&T> {
        self.in_bounds(x, y).then(|| self.get(x as usize, y as usize))
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn same_dimensions<U>(&self, other: &Tilemap<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major slice of every cell.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate over rows, each exactly `width` long.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks(self.width.max(1))
    }

    /// Orthogonal neighbours inside the map.
    pub fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets(x, y, &NEIGHBORS_4)
    }

    /// All 8 neighbours inside the map.
    pub fn neighbors_8(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets(x, y, &NEIGHBORS_8)
    }

    fn offsets<'a>(
        &'a self,
        x: usize,
        y: usize,
        offsets: &'static [(i32, i32)],
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        offsets.iter().filter_map(move |&(dx, dy)| {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            self.in_bounds(nx, ny).then_some((nx as usize, ny as usize))
        })
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// New map of the same shape with `f` applied to every cell.
    pub fn map<U>(&self, mut f: impl FnMut(usize, usize, &T) -> U) -> Tilemap<U> {
        Tilemap {
            width: self.width,
            height: self.height,
            data: self.iter().map(|(x, y, v)| f(x, y, v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_clipped_at_edges() {
        let map: Tilemap<u8> = Tilemap::new(5, 4);
        assert_eq!(map.neighbors_8(0, 0).count(), 3);
        assert_eq!(map.neighbors_8(2, 2).count(), 8);
        assert_eq!(map.neighbors_8(4, 3).count(), 3);
        assert_eq!(map.neighbors(0, 2).count(), 3);
    }

    #[test]
    fn test_rows_have_width() {
        let map = Tilemap::from_fn(7, 3, |x, y| x + y * 7);
        let rows: Vec<&[usize]> = map.rows().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 7));
        assert_eq!(*map.get(6, 2), 20);
    }

    #[test]
    fn test_get_checked() {
        let map = Tilemap::new_with(3, 3, 1u8);
        assert_eq!(map.get_checked(-1, 0), None);
        assert_eq!(map.get_checked(2, 2), Some(&1));
        assert_eq!(map.get_checked(3, 0), None);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Tilemap::from_vec(2, 2, vec![0; 3]).is_none());
        assert!(Tilemap::from_vec(2, 2, vec![0; 4]).is_some());
    }
}
