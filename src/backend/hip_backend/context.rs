//! Device execution context and the elementwise kernel executor
//!
//! A [`HipContext`] owns one device and one in-order stream. Every launch
//! issued through it is queued on that stream and completes in issue order;
//! nothing here waits for completion unless `debug_sync_launch` is set or
//! the caller synchronizes explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLockReadGuard;

use crate::backend::hip_backend::device::HipDevice;
use crate::backend::hip_backend::error::{HipError, HipResult};
use crate::backend::hip_backend::launch::{kernel_loop, validate_launch_config, LaunchConfig};
use crate::backend::hip_backend::stream::HipStream;
use crate::config::DeviceConfig;
use crate::tensor::{DeviceBuffer, Element, Storage, TypedBuffer};

/// Launch counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LaunchStats {
    /// Kernels queued on the stream
    pub kernels_launched: u64,
    /// Elementwise launches skipped because `N == 0`
    pub empty_launches_skipped: u64,
}

/// One device plus its ordered stream
#[derive(Debug)]
pub struct HipContext {
    config: DeviceConfig,
    device: HipDevice,
    stream: HipStream,
    kernels_launched: AtomicU64,
    empty_launches_skipped: AtomicU64,
}

impl HipContext {
    pub fn new(config: DeviceConfig) -> HipResult<Self> {
        config.validate()?;
        let device = HipDevice::new(&config);
        let stream = HipStream::new()?;
        tracing::debug!(
            device = device.device_id(),
            arch = %config.arch,
            stream = stream.id(),
            "HIP context created"
        );
        Ok(HipContext {
            config,
            device,
            stream,
            kernels_launched: AtomicU64::new(0),
            empty_launches_skipped: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn device(&self) -> &HipDevice {
        &self.device
    }

    /// The stream all launches of this context are ordered on
    pub fn hip_stream(&self) -> &HipStream {
        &self.stream
    }

    pub fn stats(&self) -> LaunchStats {
        LaunchStats {
            kernels_launched: self.kernels_launched.load(Ordering::Relaxed),
            empty_launches_skipped: self.empty_launches_skipped.load(Ordering::Relaxed),
        }
    }

    /// 1-D launch geometry for `n` elements under this context's config
    pub fn launch_config(&self, n: usize) -> LaunchConfig {
        LaunchConfig::for_num_elements_with(n, self.config.threads_per_block, self.config.max_blocks)
    }

    /// Record an elementwise launch skipped because there is nothing to do
    pub fn note_empty_launch(&self, name: &str) {
        self.empty_launches_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(kernel = name, "empty launch skipped");
    }

    pub fn synchronize(&self) -> HipResult<()> {
        self.stream.synchronize()
    }

    /// Queue a custom kernel.
    ///
    /// The configuration is validated against the device limits on the host;
    /// an invalid one is rejected before anything is queued.
    pub fn launch<K>(&self, name: &str, config: LaunchConfig, kernel: K) -> HipResult<()>
    where
        K: FnOnce(&LaunchConfig) -> HipResult<()> + Send + 'static,
    {
        validate_launch_config(&config, self.device.limits())?;
        tracing::debug!(
            kernel = name,
            grid = config.grid_dim.0,
            block = config.block_dim.0,
            "launching kernel"
        );
        self.stream.launch(name, Box::new(move || kernel(&config)))?;
        self.kernels_launched.fetch_add(1, Ordering::Relaxed);

        if self.config.debug_sync_launch {
            self.stream.synchronize()?;
        }
        Ok(())
    }

    /// `out[i] = f(input[i])` for `i` in `[0, n)`
    pub fn launch_map<I, O, F>(
        &self,
        name: &str,
        n: usize,
        input: TypedBuffer<I>,
        output: TypedBuffer<O>,
        f: F,
    ) -> HipResult<()>
    where
        I: Element,
        O: Element,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        if n == 0 {
            self.note_empty_launch(name);
            return Ok(());
        }
        let config = self.launch_config(n);
        self.launch(name, config, move |config| {
            let a = InputView::open(&input, output.buffer())?;
            let a = a.slice(n)?;
            let mut guard = output.buffer().write()?;
            let out = output_slice::<O>(&mut guard, n)?;
            kernel_loop(config, out, |i, slot| *slot = f(a[i]));
            Ok(())
        })
    }

    /// `out[i] = f(a[i], b[i])`
    pub fn launch_map2<A, B, O, F>(
        &self,
        name: &str,
        n: usize,
        a: TypedBuffer<A>,
        b: TypedBuffer<B>,
        output: TypedBuffer<O>,
        f: F,
    ) -> HipResult<()>
    where
        A: Element,
        B: Element,
        O: Element,
        F: Fn(A, B) -> O + Send + Sync + 'static,
    {
        if n == 0 {
            self.note_empty_launch(name);
            return Ok(());
        }
        let config = self.launch_config(n);
        self.launch(name, config, move |config| {
            let a_view = InputView::open(&a, output.buffer())?;
            let b_view = InputView::open(&b, output.buffer())?;
            let (a, b) = (a_view.slice(n)?, b_view.slice(n)?);
            let mut guard = output.buffer().write()?;
            let out = output_slice::<O>(&mut guard, n)?;
            kernel_loop(config, out, |i, slot| *slot = f(a[i], b[i]));
            Ok(())
        })
    }

    /// `out[i] = f(a[i], b[i], c[i])`
    #[allow(clippy::too_many_arguments)]
    pub fn launch_map3<A, B, C, O, F>(
        &self,
        name: &str,
        n: usize,
        a: TypedBuffer<A>,
        b: TypedBuffer<B>,
        c: TypedBuffer<C>,
        output: TypedBuffer<O>,
        f: F,
    ) -> HipResult<()>
    where
        A: Element,
        B: Element,
        C: Element,
        O: Element,
        F: Fn(A, B, C) -> O + Send + Sync + 'static,
    {
        if n == 0 {
            self.note_empty_launch(name);
            return Ok(());
        }
        let config = self.launch_config(n);
        self.launch(name, config, move |config| {
            let a_view = InputView::open(&a, output.buffer())?;
            let b_view = InputView::open(&b, output.buffer())?;
            let c_view = InputView::open(&c, output.buffer())?;
            let (a, b, c) = (a_view.slice(n)?, b_view.slice(n)?, c_view.slice(n)?);
            let mut guard = output.buffer().write()?;
            let out = output_slice::<O>(&mut guard, n)?;
            kernel_loop(config, out, |i, slot| *slot = f(a[i], b[i], c[i]));
            Ok(())
        })
    }
}

/// Read access to a kernel input.
///
/// An input that aliases the output is copied first so the kernel can take
/// the output lock; everything else is read in place.
enum InputView<'a, T> {
    Shared(RwLockReadGuard<'a, Storage>),
    Owned(Vec<T>),
}

impl<'a, T: Element> InputView<'a, T> {
    fn open(input: &'a TypedBuffer<T>, output: &DeviceBuffer) -> HipResult<Self> {
        if input.ptr_eq(output) {
            Ok(InputView::Owned(input.to_vec()?))
        } else {
            Ok(InputView::Shared(input.buffer().read()?))
        }
    }

    fn slice(&self, n: usize) -> HipResult<&[T]> {
        let full: &[T] = match self {
            InputView::Shared(guard) => T::slice(guard).ok_or_else(|| {
                HipError::MemoryAccessFault(format!("input buffer does not hold {}", T::DTYPE))
            })?,
            InputView::Owned(values) => values,
        };
        full.get(..n).ok_or_else(|| {
            HipError::MemoryAccessFault(format!(
                "read of {} elements from a buffer of {}",
                n,
                full.len()
            ))
        })
    }
}

fn output_slice<T: Element>(storage: &mut Storage, n: usize) -> HipResult<&mut [T]> {
    let full = T::slice_mut(storage).ok_or_else(|| {
        HipError::MemoryAccessFault(format!("output buffer does not hold {}", T::DTYPE))
    })?;
    let len = full.len();
    full.get_mut(..n).ok_or_else(|| {
        HipError::MemoryAccessFault(format!("write of {} elements to a buffer of {}", n, len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::DeviceBuffer;

    fn context() -> HipContext {
        HipContext::new(DeviceConfig::default()).unwrap()
    }

    #[test]
    fn test_launch_map_covers_every_index() {
        let ctx = context();
        let n = 512 * 4096 + 3;
        let input = DeviceBuffer::from_vec((0..n as i64).collect::<Vec<_>>());
        let output = DeviceBuffer::allocate(crate::tensor::DataType::Int64, n).unwrap();

        ctx.launch_map(
            "plus_one",
            n,
            input.typed::<i64>().unwrap(),
            output.typed::<i64>().unwrap(),
            |x| x + 1,
        )
        .unwrap();
        ctx.synchronize().unwrap();

        let out = output.typed::<i64>().unwrap().to_vec().unwrap();
        assert!(out.iter().enumerate().all(|(i, &v)| v == i as i64 + 1));
        assert_eq!(ctx.stats().kernels_launched, 1);
    }

    #[test]
    fn test_zero_elements_skips_launch() {
        let ctx = context();
        let input = DeviceBuffer::from_vec(Vec::<f32>::new());
        let output = DeviceBuffer::from_vec(Vec::<f32>::new());
        ctx.launch_map(
            "noop",
            0,
            input.typed::<f32>().unwrap(),
            output.typed::<f32>().unwrap(),
            |x| x,
        )
        .unwrap();

        let stats = ctx.stats();
        assert_eq!(stats.kernels_launched, 0);
        assert_eq!(stats.empty_launches_skipped, 1);
    }

    #[test]
    fn test_in_place_map() {
        let ctx = context();
        let buf = DeviceBuffer::from_vec(vec![1.0f32, -2.0, 3.0]);
        let typed = buf.typed::<f32>().unwrap();
        ctx.launch_map("negate", 3, typed.clone(), typed.clone(), |x: f32| -x)
            .unwrap();
        ctx.synchronize().unwrap();
        assert_eq!(typed.to_vec().unwrap(), vec![-1.0, 2.0, -3.0]);
    }

    #[test]
    fn test_short_buffer_faults_on_synchronize() {
        let ctx = context();
        let input = DeviceBuffer::from_vec(vec![1i32, 2]);
        let output = DeviceBuffer::from_vec(vec![0i32; 4]);
        ctx.launch_map(
            "overread",
            4,
            input.typed::<i32>().unwrap(),
            output.typed::<i32>().unwrap(),
            |x| x,
        )
        .unwrap();

        let err = ctx.synchronize().unwrap_err();
        assert!(matches!(err, HipError::MemoryAccessFault(_)));
    }

    #[test]
    fn test_invalid_geometry_rejected_before_queueing() {
        let ctx = context();
        let err = ctx
            .launch("too_wide", LaunchConfig::linear(1, 4096), |_| Ok(()))
            .unwrap_err();
        assert!(err.is_launch_config_error());
        assert_eq!(ctx.stats().kernels_launched, 0);
        assert!(ctx.synchronize().is_ok());
    }

    #[test]
    fn test_debug_sync_launch_surfaces_fault_at_launch() {
        let ctx = HipContext::new(DeviceConfig::new().with_debug_sync_launch(true)).unwrap();
        let err = ctx
            .launch("fault", LaunchConfig::linear(1, 64), |_| {
                Err(HipError::MemoryAccessFault("bad address".into()))
            })
            .unwrap_err();
        assert!(err.is_sticky());
    }
}
