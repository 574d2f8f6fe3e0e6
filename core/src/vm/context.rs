use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// 执行器开关。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    /// Call depth at which `CALLF`/`CALLV`/`CALLI` raise `StackOverflowException`.
    pub recursion_limit: usize,
    /// Reported to programs through `runtime$assertionsEnabled`.
    pub assertions_enabled: bool,
    /// Log every executed instruction on `neonx::vm::trace`.
    pub trace: bool,
    /// Collect instruction and depth counters.
    pub stats: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            assertions_enabled: true,
            trace: false,
            stats: false,
        }
    }
}

/// VM 运行期宿主上下文。
///
/// - 保存命令行参数（`sys$args`）；
/// - 持有标准输出 / 标准错误的写入端，测试可替换为内存缓冲；
/// - 携带 [`VmOptions`]。
pub struct VmContext {
    pub args: Vec<String>,
    pub options: VmOptions,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl fmt::Debug for VmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmContext")
            .field("args", &self.args)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for VmContext {
    fn default() -> Self {
        Self::new()
    }
}

impl VmContext {
    /// Context bound to the process streams.
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            options: VmOptions::default(),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_options(mut self, options: VmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_stdout(mut self, out: impl Write + 'static) -> Self {
        self.stdout = Box::new(out);
        self
    }

    pub fn with_stderr(mut self, err: impl Write + 'static) -> Self {
        self.stderr = Box::new(err);
        self
    }

    pub fn stdout(&mut self) -> &mut dyn Write {
        self.stdout.as_mut()
    }

    pub fn stderr(&mut self) -> &mut dyn Write {
        self.stderr.as_mut()
    }
}

/// In-memory writer whose contents stay readable after the context takes it.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Rc<RefCell<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
