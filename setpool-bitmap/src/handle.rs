use crate::engine::{SetEngine, SetStatistics};
use crate::range::ClampedRange;
use crate::source::{IntoSetSource, SetSource};
use roaring::RoaringBitmap;
use setpool_error::{Error, Result};
use std::fmt::{self, Write};

/// An owned compressed set of `u32` values.
///
/// The container is never shared with another handle. Operations that
/// produce a new set build a fresh container and only then install it.
pub struct SetHandle<E: SetEngine = RoaringBitmap> {
    container: E,
    copy_on_write: bool,
}

impl SetHandle<RoaringBitmap> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: SetEngine> Default for SetHandle<E> {
    fn default() -> Self {
        Self::from_container(E::default())
    }
}

impl<E: SetEngine> SetHandle<E> {
    /// An empty handle, or an allocation error if the engine cannot build
    /// a container.
    pub fn try_new() -> Result<Self> {
        let container = E::try_new().ok_or(Error::allocation("new"))?;
        Ok(Self::from_container(container))
    }

    pub fn from_container(container: E) -> Self {
        Self {
            container,
            copy_on_write: false,
        }
    }

    pub(crate) fn from_parts(container: E, copy_on_write: bool) -> Self {
        Self {
            container,
            copy_on_write,
        }
    }

    pub fn container(&self) -> &E {
        &self.container
    }

    pub fn into_container(self) -> E {
        self.container
    }

    pub fn copy_on_write(&self) -> bool {
        self.copy_on_write
    }

    pub fn set_copy_on_write(&mut self, enabled: bool) {
        self.copy_on_write = enabled;
    }

    /// A deep copy carrying the same copy-on-write flag.
    pub fn try_clone(&self) -> Result<Self> {
        let container = self
            .container
            .try_clone()
            .ok_or(Error::allocation("clone"))?;
        Ok(Self::from_parts(container, self.copy_on_write))
    }

    pub fn add(&mut self, value: u32) {
        self.container.insert(value);
    }

    /// Returns whether the value was absent.
    pub fn try_add(&mut self, value: u32) -> bool {
        self.container.insert(value)
    }

    pub fn remove(&mut self, value: u32) {
        self.container.remove(value);
    }

    /// Returns whether the value was present.
    pub fn remove_checked(&mut self, value: u32) -> bool {
        if self.is_empty() {
            return false;
        }
        self.container.remove(value)
    }

    /// Replaces the container with a new empty one. On failure the current
    /// contents are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.container = E::try_new().ok_or(Error::allocation("clear"))?;
        Ok(())
    }

    /// Replaces the contents with a copy of `source`.
    ///
    /// A set source is deep-cloned together with its copy-on-write flag.
    /// Raw values replace the contents. Nothing changes on error.
    pub fn copy_from<'a, S>(&mut self, source: S) -> Result<()>
    where
        S: IntoSetSource<'a, E>,
    {
        match source.into_set_source("copy_from")? {
            SetSource::Set(other) => {
                self.container = other
                    .container
                    .try_clone()
                    .ok_or(Error::allocation("copy_from"))?;
                self.copy_on_write = other.copy_on_write;
            }
            SetSource::Buffer(values) => self.container = Self::materialize(values, "copy_from")?,
            SetSource::Sequence(values) => {
                self.container = Self::materialize(&values, "copy_from")?
            }
        }
        Ok(())
    }

    /// Adds every value of `source`.
    pub fn add_many<'a, S>(&mut self, source: S) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        match source.into_set_source("add_many")? {
            SetSource::Set(other) => self.container.union_with(&other.container),
            SetSource::Buffer(values) => self.container.insert_many(values),
            SetSource::Sequence(values) => self.container.insert_many(&values),
        }
        Ok(self)
    }

    /// In-place union, same as [`SetHandle::add_many`].
    pub fn or_in_place<'a, S>(&mut self, source: S) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        self.add_many(source)
    }

    /// In-place difference.
    pub fn remove_many<'a, S>(&mut self, source: S) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        self.apply_in_place(source, "remove_many", E::difference_with)
    }

    /// In-place intersection.
    pub fn and_in_place<'a, S>(&mut self, source: S) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        self.apply_in_place(source, "and_in_place", E::intersect_with)
    }

    /// In-place symmetric difference.
    pub fn xor_in_place<'a, S>(&mut self, source: S) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        self.apply_in_place(source, "xor_in_place", E::symmetric_difference_with)
    }

    fn apply_in_place<'a, S>(
        &mut self,
        source: S,
        context: &'static str,
        op: fn(&mut E, &E),
    ) -> Result<&mut Self>
    where
        S: IntoSetSource<'a, E>,
    {
        match source.into_set_source(context)? {
            SetSource::Set(other) => op(&mut self.container, &other.container),
            SetSource::Buffer(values) => {
                let transient = Self::materialize(values, context)?;
                op(&mut self.container, &transient);
            }
            SetSource::Sequence(values) => {
                let transient = Self::materialize(&values, context)?;
                op(&mut self.container, &transient);
            }
        }
        Ok(self)
    }

    fn materialize(values: &[u32], context: &'static str) -> Result<E> {
        let mut container = E::try_new().ok_or(Error::allocation(context))?;
        container.insert_many(values);
        Ok(container)
    }

    /// Adds every value in `[lower, upper)` after clamping.
    pub fn add_range(&mut self, lower: f64, upper: f64) {
        if let Some(range) = ClampedRange::new(lower, upper) {
            self.container.insert_range(range.to_inclusive());
        }
    }

    /// Removes every value in `[lower, upper)` after clamping.
    pub fn remove_range(&mut self, lower: f64, upper: f64) {
        if let Some(range) = ClampedRange::new(lower, upper) {
            self.container.remove_range(range.to_inclusive());
        }
    }

    /// Complements membership of every value in `[lower, upper)` after
    /// clamping. Values are toggled one container block at a time.
    pub fn flip_range(&mut self, lower: f64, upper: f64) {
        if let Some(range) = ClampedRange::new(lower, upper) {
            self.container.flip_range(range.to_inclusive());
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        self.container.contains(value)
    }

    pub fn len(&self) -> u64 {
        self.container.cardinality()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest member, `u32::MAX` when empty.
    pub fn minimum(&self) -> u32 {
        self.container.min().unwrap_or(u32::MAX)
    }

    /// Largest member, 0 when empty.
    pub fn maximum(&self) -> u32 {
        self.container.max().unwrap_or(0)
    }

    pub fn rank(&self, value: u32) -> u64 {
        self.container.rank(value)
    }

    pub fn select(&self, n: u32) -> Option<u32> {
        self.container.select(n)
    }

    pub fn iter(&self) -> E::Iter<'_> {
        self.container.iter()
    }

    /// Container layout and value summary.
    pub fn statistics(&self) -> SetStatistics {
        self.container.statistics()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    /// Up to `limit` members starting at the `offset`th smallest.
    pub fn range_to_vec(&self, offset: usize, limit: usize) -> Vec<u32> {
        self.iter().skip(offset).take(limit).collect()
    }

    /// `"[1,2,3]"`. Once the text grows past `max_len` it is cut short with
    /// `"...]"`.
    pub fn content_to_string(&self, max_len: usize) -> String {
        let mut out = String::from("[");
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}", value);
            if out.len() > max_len {
                out.push_str("...]");
                return out;
            }
        }
        out.push(']');
        out
    }
}

impl<E: SetEngine + PartialEq> PartialEq for SetHandle<E> {
    /// Membership equality, the copy-on-write flag is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container
    }
}

impl<E: SetEngine> fmt::Debug for SetHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetHandle")
            .field("len", &self.len())
            .field("copy_on_write", &self.copy_on_write)
            .finish()
    }
}

impl From<RoaringBitmap> for SetHandle<RoaringBitmap> {
    fn from(bitmap: RoaringBitmap) -> Self {
        Self::from_container(bitmap)
    }
}

impl FromIterator<u32> for SetHandle<RoaringBitmap> {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from_container(RoaringBitmap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exhausted::Exhausted;
    use crate::source::HostValue;

    fn set(values: &[u32]) -> SetHandle {
        values.iter().copied().collect()
    }

    #[test]
    fn test_add_and_try_add() {
        let mut handle = SetHandle::new();
        handle.add(7);
        assert!(handle.contains(7));
        assert!(!handle.try_add(7));
        assert!(handle.try_add(8));
        assert_eq!(handle.len(), 2);
    }

    #[test]
    fn test_remove_checked() {
        let mut handle = set(&[1, 2]);
        assert!(handle.remove_checked(1));
        assert!(!handle.remove_checked(1));
        handle.remove(2);
        handle.remove(2);
        assert!(handle.is_empty());
        assert!(!handle.remove_checked(2));
    }

    #[test]
    fn test_clear() {
        let mut handle = set(&[1, 2, 3]);
        handle.clear().unwrap();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_clear_failure_keeps_contents() {
        let mut handle = SetHandle::from_container(Exhausted::default());
        handle.add(5);

        assert_eq!(handle.clear(), Err(Error::allocation("clear")));
        assert!(handle.contains(5));
    }

    #[test]
    fn test_copy_from_set_copies_flag() {
        let mut source = set(&[4, 5]);
        source.set_copy_on_write(true);

        let mut target = set(&[1]);
        target.copy_from(&source).unwrap();
        assert_eq!(target.to_vec(), vec![4, 5]);
        assert!(target.copy_on_write());

        // A copy, not an alias.
        target.add(6);
        assert_eq!(source.to_vec(), vec![4, 5]);
    }

    #[test]
    fn test_copy_from_values_replaces() {
        let mut target = set(&[1, 2]);
        target.copy_from(&[9, 3, 9]).unwrap();
        assert_eq!(target.to_vec(), vec![3, 9]);

        target.copy_from(vec![10]).unwrap();
        assert_eq!(target.to_vec(), vec![10]);
    }

    #[test]
    fn test_copy_from_rejects_bad_input_without_mutation() {
        let mut target = set(&[1, 2]);
        let err = target.copy_from(&HostValue::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::ArgumentType { context: "copy_from", .. }));
        assert_eq!(target.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_copy_from_failure_keeps_contents() {
        let source = SetHandle::from_container(Exhausted::default());
        let mut target = SetHandle::from_container(Exhausted::default());
        target.add(1);

        assert_eq!(
            target.copy_from(&source),
            Err(Error::allocation("copy_from"))
        );
        assert!(target.contains(1));
    }

    #[test]
    fn test_in_place_operations_chain() {
        let mut handle = set(&[1, 2, 3, 4]);
        let other = set(&[3, 4, 5]);

        handle
            .add_many(&[10, 11])
            .unwrap()
            .remove_many(&[1])
            .unwrap()
            .and_in_place(&[2, 3, 4, 10, 99])
            .unwrap()
            .xor_in_place(&other)
            .unwrap();

        assert_eq!(handle.to_vec(), vec![2, 5, 10]);
    }

    #[test]
    fn test_in_place_with_host_sequences() {
        let items = [HostValue::Number(1.0), HostValue::Number(2.0)];
        let mut handle = set(&[2, 3]);

        handle.or_in_place(&HostValue::Array(&items)).unwrap();
        assert_eq!(handle.to_vec(), vec![1, 2, 3]);

        handle.remove_many(&HostValue::Int32Array(&[3])).unwrap();
        assert_eq!(handle.to_vec(), vec![1, 2]);

        let err = handle
            .and_in_place(&HostValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, Error::ArgumentType { context: "and_in_place", .. }));
        assert_eq!(handle.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_transient_materialization_failure() {
        let mut handle = SetHandle::from_container(Exhausted::default());
        handle.add(1);
        assert_eq!(
            handle.xor_in_place(&[1, 2]).map(|_| ()),
            Err(Error::allocation("xor_in_place"))
        );
        assert_eq!(handle.to_vec(), vec![1]);
    }

    #[test]
    fn test_ranges() {
        let mut handle = SetHandle::new();
        handle.add_range(5.0, 5.0);
        handle.add_range(10.0, 3.0);
        handle.add_range(f64::NAN, 3.0);
        assert!(handle.is_empty());

        handle.add_range(-10.0, 4.0);
        assert_eq!(handle.to_vec(), vec![0, 1, 2, 3]);

        handle.flip_range(2.0, 6.0);
        assert_eq!(handle.to_vec(), vec![0, 1, 4, 5]);

        handle.remove_range(0.0, 4.5);
        assert_eq!(handle.to_vec(), vec![4, 5]);
    }

    #[test]
    fn test_add_range_to_limit() {
        let mut handle = SetHandle::new();
        handle.add_range(4_294_967_290.0, 4_294_967_296.0 + 100.0);
        assert_eq!(handle.len(), 6);
        assert_eq!(handle.maximum(), u32::MAX);
    }

    #[test]
    fn test_min_max() {
        let empty = SetHandle::new();
        assert_eq!(empty.minimum(), u32::MAX);
        assert_eq!(empty.maximum(), 0);

        let handle = set(&[8, 3, 12]);
        assert_eq!(handle.minimum(), 3);
        assert_eq!(handle.maximum(), 12);
        assert_eq!(handle.rank(8), 2);
        assert_eq!(handle.select(0), Some(3));
    }

    #[test]
    fn test_statistics() {
        let empty = SetHandle::new().statistics();
        assert_eq!((empty.containers, empty.size), (0, 0));
        assert_eq!((empty.min_value, empty.max_value), (u32::MAX, 0));

        let mut handle = set(&[1, 2, 3, 4, 6, 7]);
        handle.add_many(&[999_991u32, 999_992, 999_993, 999_994, 999_996, 999_997]).unwrap();
        let stats = handle.statistics();
        assert_eq!(stats.containers, 2);
        assert_eq!(stats.values_in_array_containers, 12);
        assert_eq!((stats.min_value, stats.max_value), (1, 999_997));
        assert_eq!(stats.sum_of_values, 5_999_986);
        assert_eq!(stats.size, handle.len());
    }

    #[test]
    fn test_range_to_vec() {
        let handle = set(&[1, 2, 3, 4, 5]);
        assert_eq!(handle.range_to_vec(1, 3), vec![2, 3, 4]);
        assert_eq!(handle.range_to_vec(4, 10), vec![5]);
        assert!(handle.range_to_vec(9, 1).is_empty());
    }

    #[test]
    fn test_content_to_string() {
        let mut handle = set(&[100, 200]);
        handle.add_range(201.0, 210.0);
        assert_eq!(handle.content_to_string(13), "[100,200,201,202...]");

        assert_eq!(set(&[1, 2, 3]).content_to_string(100), "[1,2,3]");
        assert_eq!(SetHandle::new().content_to_string(0), "[]");
    }

    #[test]
    fn test_try_clone() {
        let mut handle = set(&[1, 2]);
        handle.set_copy_on_write(true);

        let clone = handle.try_clone().unwrap();
        assert_eq!(clone, handle);
        assert!(clone.copy_on_write());

        let exhausted = SetHandle::from_container(Exhausted::default());
        assert_eq!(exhausted.try_clone().unwrap_err(), Error::allocation("clone"));
    }
}
