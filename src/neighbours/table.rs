//! Per-worker chained hash table used by the neighbours algorithm (§4.7,
//! §9): `h` primary buckets followed by an overflow region sized at most
//! `4*h`, for a total capacity of `5*h` stored faces per worker.

#[derive(Clone, Copy)]
enum Link {
    End,
    Overflow(usize),
}

#[derive(Clone, Copy)]
struct Entry {
    tet: usize,
    face: u8,
    key: (i64, i64, i64),
    next: Link,
}

#[derive(Clone, Copy)]
enum Loc {
    Primary,
    Overflow(usize),
}

pub struct Table {
    primary: Vec<Option<Entry>>,
    overflow: Vec<Entry>,
    overflow_capacity: usize,
}

impl Table {
    pub fn new(h: usize) -> Self {
        Self {
            primary: vec![None; h],
            overflow: Vec::new(),
            overflow_capacity: 4 * h,
        }
    }

    /// Looks up `key` without mutating the table. Used by phase two to
    /// probe another worker's table.
    pub fn find(&self, key: (i64, i64, i64)) -> Option<(usize, u8)> {
        let bucket = key_bucket(key, self.primary.len());
        let mut current = self.primary[bucket];
        loop {
            match current {
                None => return None,
                Some(entry) => {
                    if entry.key == key {
                        return Some((entry.tet, entry.face));
                    }
                    match entry.next {
                        Link::End => return None,
                        Link::Overflow(idx) => current = Some(self.overflow[idx]),
                    }
                }
            }
        }
    }

    /// Phase-one probe-or-insert: if `bucket` holds a chain entry matching
    /// `key`, returns it (the face this face is adjacent to) and does not
    /// modify the table. Otherwise appends a new entry for `(tet, face)` at
    /// the end of the chain and returns `None`.
    pub fn probe_or_insert(
        &mut self,
        tet: usize,
        face: u8,
        key: (i64, i64, i64),
    ) -> Option<(usize, u8)> {
        let bucket = key_bucket(key, self.primary.len());
        if self.primary[bucket].is_none() {
            self.primary[bucket] = Some(Entry {
                tet,
                face,
                key,
                next: Link::End,
            });
            return None;
        }

        let mut loc = Loc::Primary;
        loop {
            let entry = match loc {
                Loc::Primary => self.primary[bucket].unwrap(),
                Loc::Overflow(idx) => self.overflow[idx],
            };
            if entry.key == key {
                return Some((entry.tet, entry.face));
            }
            match entry.next {
                Link::End => {
                    let new_idx = self.overflow.len();
                    assert!(
                        new_idx < self.overflow_capacity,
                        "neighbours hash table overflow region exhausted"
                    );
                    self.overflow.push(Entry {
                        tet,
                        face,
                        key,
                        next: Link::End,
                    });
                    match loc {
                        Loc::Primary => {
                            self.primary[bucket].as_mut().unwrap().next = Link::Overflow(new_idx);
                        }
                        Loc::Overflow(idx) => {
                            self.overflow[idx].next = Link::Overflow(new_idx);
                        }
                    }
                    return None;
                }
                Link::Overflow(idx) => loc = Loc::Overflow(idx),
            }
        }
    }

}

fn key_bucket(key: (i64, i64, i64), h: usize) -> usize {
    crate::neighbours::face::hash_key(key, h)
}
