use std::fmt;

/// Term is the logical election epoch. A server's term never decreases.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Term(term)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The following term, or `None` once terms are used up.
    pub fn next(&self) -> Option<Term> {
        self.0.checked_add(1).map(Term)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index is a position in the log. Index 0 is the sentinel entry every log starts with.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Index(u64);

impl Index {
    pub const SENTINEL: Index = Index(0);

    pub fn new(index: u64) -> Self {
        Index(index)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Option<Index> {
        self.0.checked_add(1).map(Index)
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors_stop_at_the_end() {
        assert_eq!(Term::new(0).next(), Some(Term::new(1)));
        assert_eq!(Term::new(u64::MAX - 1).next(), Some(Term::new(u64::MAX)));
        assert_eq!(Term::new(u64::MAX).next(), None);

        assert_eq!(Index::SENTINEL.next(), Some(Index::new(1)));
        assert_eq!(Index::new(u64::MAX).next(), None);
    }
}
