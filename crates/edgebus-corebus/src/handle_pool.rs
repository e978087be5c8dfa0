use edgebus_core::CoreError;
use parking_lot::Mutex;

/// A generational handle: the low 16 bits are a slot index, the high 16 bits
/// are that slot's generation at the time of registration. Spec §6/§8
/// scenario 7: releasing a slot bumps its generation so a stale handle into
/// a reused slot is rejected rather than silently aliasing new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u32);

impl Handle {
    fn new(generation: u16, index: u16) -> Self {
        Self((generation as u32) << 16 | index as u32)
    }

    fn index(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn from_u32(v: u32) -> Self {
        Self(v)
    }
}

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// A fixed-capacity pool of generation-tagged slots. Used to hand out stable
/// handles for open sockets/streams without exposing raw indices that could
/// alias a closed-then-reused entry.
pub struct HandlePool<T> {
    slots: Mutex<Vec<Slot<T>>>,
    capacity: usize,
}

impl<T> HandlePool<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot { generation: 0, value: None });
        }
        Self { slots: Mutex::new(slots), capacity }
    }

    /// Registers `value`, returning its handle. Fails with `NoMem` if every
    /// slot is occupied.
    pub fn register(&self, value: T) -> Result<Handle, CoreError> {
        let mut slots = self.slots.lock();
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                slot.value = Some(value);
                return Ok(Handle::new(slot.generation, i as u16));
            }
        }
        Err(CoreError::no_mem("handle pool exhausted"))
    }

    /// Releases the slot referenced by `handle`, returning its value.
    /// Bumps the slot's generation so the released handle can never again
    /// address whatever is registered into that slot next.
    pub fn release(&self, handle: Handle) -> Result<T, CoreError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(handle.index())
            .ok_or_else(|| CoreError::no_entry("handle index out of range"))?;
        if slot.generation != handle.generation() {
            return Err(CoreError::no_entry("handle generation mismatch"));
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.value.take().ok_or_else(|| CoreError::no_entry("handle already released"))
    }

    /// Runs `f` against the value behind `handle` while holding the pool
    /// lock, failing with `NoEntry` on a stale or out-of-range handle.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Result<R, CoreError> {
        let slots = self.slots.lock();
        let slot = slots
            .get(handle.index())
            .ok_or_else(|| CoreError::no_entry("handle index out of range"))?;
        if slot.generation != handle.generation() {
            return Err(CoreError::no_entry("handle generation mismatch"));
        }
        let value = slot.value.as_ref().ok_or_else(|| CoreError::no_entry("handle slot is empty"))?;
        Ok(f(value))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_after_release_is_rejected() {
        let pool: HandlePool<i32> = HandlePool::new(4);
        let h1 = pool.register(10).unwrap();
        pool.release(h1).unwrap();

        let err = pool.with(h1, |v| *v).unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::NoEntry);
    }

    #[test]
    fn reused_slot_gets_a_fresh_generation() {
        let pool: HandlePool<i32> = HandlePool::new(1);
        let h1 = pool.register(1).unwrap();
        pool.release(h1).unwrap();
        let h2 = pool.register(2).unwrap();

        assert_ne!(h1.as_u32(), h2.as_u32());
        assert_eq!(pool.with(h2, |v| *v).unwrap(), 2);
        assert!(pool.with(h1, |v| *v).is_err());
    }

    #[test]
    fn pool_exhaustion_returns_no_mem() {
        let pool: HandlePool<i32> = HandlePool::new(1);
        let _h = pool.register(1).unwrap();
        let err = pool.register(2).unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::NoMem);
    }
}
