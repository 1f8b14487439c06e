//! Disjoint-set forest over location indices, used to grow the MST edge
//! set. Unioning is implicit: the loser's root becomes a child of the
//! winner's root.

pub struct UnionFind {
  parent: Vec<usize>,
}

impl UnionFind {
  /// One singleton set per element in `0..n`.
  pub fn new(n: usize) -> Self {
    UnionFind { parent: (0..n).collect() }
  }

  fn find(&mut self, x: usize) -> usize {
    let mut root = x;
    while self.parent[root] != root {
      root = self.parent[root];
    }
    // path compression
    let mut cur = x;
    while self.parent[cur] != root {
      let next = self.parent[cur];
      self.parent[cur] = root;
      cur = next;
    }
    root
  }

  pub fn same_set(&mut self, a: usize, b: usize) -> bool {
    self.find(a) == self.find(b)
  }

  /// Merges the set containing `loser` into the set containing `winner`.
  /// Returns false if they were already joined.
  pub fn union(&mut self, winner: usize, loser: usize) -> bool {
    let w = self.find(winner);
    let l = self.find(loser);
    if w == l {
      return false;
    }
    self.parent[l] = w;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn union_and_find() {
    let mut uf = UnionFind::new(6);
    assert!(!uf.same_set(0, 1));
    assert!(uf.union(0, 1));
    assert!(uf.same_set(0, 1));
    assert!(!uf.union(1, 0));
    assert!(uf.union(2, 3));
    assert!(uf.union(0, 3));
    assert!(uf.same_set(1, 2));
    assert!(!uf.same_set(4, 5));
  }

  #[test]
  fn winner_root_survives() {
    let mut uf = UnionFind::new(4);
    uf.union(1, 2);
    uf.union(1, 3);
    assert_eq!(uf.find(2), uf.find(1));
    assert_eq!(uf.find(3), uf.find(1));
  }
}
