//! Record identifiers.

use std::fmt;
use std::str::FromStr;

use crate::utils::error::Error;

/// Record identifier: a `(bucket, position)` pair.
///
/// RIDs are database-scoped value types. A RID with a negative bucket or a
/// negative position is *virtual*: it names something with no backing record,
/// such as a lightweight edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    bucket_id: i32,
    position: i64,
}

impl Rid {
    /// Sentinel written where no record is referenced ("no edges yet").
    pub const NULL: Rid = Rid {
        bucket_id: -1,
        position: -1,
    };

    /// Creates a new RID.
    #[must_use]
    pub const fn new(bucket_id: i32, position: i64) -> Self {
        Self {
            bucket_id,
            position,
        }
    }

    /// Builds an optional RID from stored components, mapping the null
    /// sentinel to `None`.
    #[must_use]
    pub const fn from_parts(bucket_id: i32, position: i64) -> Option<Self> {
        if bucket_id == -1 && position == -1 {
            None
        } else {
            Some(Self::new(bucket_id, position))
        }
    }

    /// Returns the bucket id.
    #[must_use]
    pub const fn bucket_id(&self) -> i32 {
        self.bucket_id
    }

    /// Returns the position inside the bucket.
    #[must_use]
    pub const fn position(&self) -> i64 {
        self.position
    }

    /// Returns true if this RID has no backing record.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.bucket_id < 0 || self.position < 0
    }

    /// Returns true if this is the null sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.bucket_id == -1 && self.position == -1
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.bucket_id, self.position)
    }
}

impl FromStr for Rid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidArgument(format!("'{s}' is not a valid RID"));
        let body = s.strip_prefix('#').unwrap_or(s);
        let (bucket, position) = body.split_once(':').ok_or_else(invalid)?;
        let bucket_id = bucket.trim().parse::<i32>().map_err(|_| invalid())?;
        let position = position.trim().parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::new(bucket_id, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_rids() {
        assert!(!Rid::new(3, 0).is_virtual());
        assert!(Rid::new(3, -5).is_virtual());
        assert!(Rid::new(-2, 5).is_virtual());
        assert!(Rid::NULL.is_virtual());
        assert!(Rid::NULL.is_null());
    }

    #[test]
    fn test_from_parts_sentinel() {
        assert_eq!(Rid::from_parts(-1, -1), None);
        assert_eq!(Rid::from_parts(4, 10), Some(Rid::new(4, 10)));
        assert_eq!(Rid::from_parts(4, -1), Some(Rid::new(4, -1)));
    }

    #[test]
    fn test_display_and_parse() {
        let rid = Rid::new(12, 345);
        assert_eq!(rid.to_string(), "#12:345");
        assert_eq!("#12:345".parse::<Rid>().unwrap(), rid);
        assert_eq!("7:-3".parse::<Rid>().unwrap(), Rid::new(7, -3));
        assert!("#12".parse::<Rid>().is_err());
        assert!("#a:1".parse::<Rid>().is_err());
    }

    #[test]
    fn test_ordering() {
        let mut rids = vec![Rid::new(2, 1), Rid::new(1, 9), Rid::new(1, 2)];
        rids.sort();
        assert_eq!(rids, vec![Rid::new(1, 2), Rid::new(1, 9), Rid::new(2, 1)]);
    }
}
