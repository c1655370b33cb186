// crates/pf_foundation/src/memory.rs

//! Memory alignment utilities.
//!
//! Provides an aligned, zero-initialized buffer backed by std::alloc for
//! SIMD-friendly access, with parallel iterators and Serde support. Field
//! data throughout the engine lives in these buffers laid out SoA.

use bytemuck::Pod;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ops::{Deref, DerefMut, Index, IndexMut};

/// Cache-line / AVX-512 alignment in bytes.
pub const CACHE_ALIGN: usize = 64;

/// 对齐连续缓冲区
///
/// 分配始终按 [`CACHE_ALIGN`] 对齐且零初始化。长度固定，不支持 push；
/// 场数据的生命周期与网格一致，重分配通过重建完成。
pub struct AlignedVec<T: Pod> {
    ptr: *mut T,
    len: usize,
}

unsafe impl<T: Pod + Send> Send for AlignedVec<T> {}
unsafe impl<T: Pod + Sync> Sync for AlignedVec<T> {}

impl<T: Pod> AlignedVec<T> {
    /// Create a zero-initialized buffer of length `len`.
    pub fn zeros(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: std::ptr::null_mut(),
                len: 0,
            };
        }

        let layout = Self::layout_for(len);
        let ptr = unsafe { alloc_zeroed(layout) as *mut T };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        debug_assert_eq!((ptr as usize) % layout.align(), 0);

        Self { ptr, len }
    }

    /// Copy an existing slice into a freshly aligned buffer.
    pub fn from_slice(data: &[T]) -> Self {
        let mut buf = Self::zeros(data.len());
        buf.as_mut_slice().copy_from_slice(data);
        buf
    }

    fn layout_for(len: usize) -> Layout {
        let size = len * std::mem::size_of::<T>();
        let align = CACHE_ALIGN.max(std::mem::align_of::<T>());
        Layout::from_size_align(size, align).expect("invalid layout")
    }

    /// Buffer length in elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// Borrow as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.len == 0 {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    /// Fill every element with `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        for v in self.as_mut_slice() {
            *v = value;
        }
    }

    /// 并行只读迭代器
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        self.as_slice().par_iter()
    }

    /// 并行可变迭代器
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T>
    where
        T: Send + Sync,
    {
        self.as_mut_slice().par_iter_mut()
    }

    /// Parallel fill.
    pub fn par_fill(&mut self, value: T)
    where
        T: Copy + Send + Sync,
    {
        self.as_mut_slice().par_iter_mut().for_each(|v| *v = value);
    }
}

impl<T: Pod> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                dealloc(self.ptr as *mut u8, Self::layout_for(self.len));
            }
        }
    }
}

impl<T: Pod> Clone for AlignedVec<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Pod + std::fmt::Debug> std::fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedVec")
            .field("len", &self.len)
            .finish()
    }
}

impl<T: Pod> Deref for AlignedVec<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for AlignedVec<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod> Index<usize> for AlignedVec<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Pod> IndexMut<usize> for AlignedVec<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T: Pod + Serialize> Serialize for AlignedVec<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

impl<'de, T: Pod + Deserialize<'de>> Deserialize<'de> for AlignedVec<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_slice(&data))
    }
}
