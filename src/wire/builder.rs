//! Write side of the wire codec: incrementally assembles an encoded buffer.

/// Which kind of container a stack frame tracks.
enum ContainerKind {
    Array,
    Object,
}

struct OpenContainer {
    /// Offset of the container's tag byte within `Builder::buf`.
    start: usize,
    kind: ContainerKind,
    /// Number of elements/members appended so far.
    count: u32,
}

/// Builds an encoded [`super::Slice`] buffer by opening/closing containers
/// and appending scalar values, mirroring `velocypack::Builder`.
///
/// Containers reserve a placeholder length/count header on `open_*` and
/// patch it in place on the matching `close_*`, so a container's total byte
/// length is always known without a second pass.
pub struct Builder {
    buf: Vec<u8>,
    stack: Vec<OpenContainer>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            buf: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Bumps the enclosing container's member count, if any container is
    /// open. Every top-level `append_*`/`close_*` call is itself one member
    /// of its parent.
    fn count_one(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.count += 1;
        }
    }

    pub fn append_null(&mut self) {
        self.buf.push(super::TAG_NULL);
        self.count_one();
    }

    pub fn append_bool(&mut self, value: bool) {
        self.buf
            .push(if value { super::TAG_TRUE } else { super::TAG_FALSE });
        self.count_one();
    }

    pub fn append_double(&mut self, value: f64) {
        self.buf.push(super::TAG_DOUBLE);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.count_one();
    }

    pub fn append_string(&mut self, value: &str) {
        self.buf.push(super::TAG_STRING);
        self.buf
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.count_one();
    }

    /// Writes an object member's key. Must precede the value's `append_*`/
    /// `open_*` call. Only valid while an object is the innermost open
    /// container.
    pub fn key(&mut self, name: &str) {
        debug_assert!(
            matches!(self.stack.last(), Some(f) if matches!(f.kind, ContainerKind::Object)),
            "key() called outside an open object"
        );
        self.buf.push(super::TAG_STRING);
        self.buf
            .extend_from_slice(&(name.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        // The key itself is not a counted member; the value that follows is.
    }

    fn open(&mut self, tag: u8, kind: ContainerKind) {
        let start = self.buf.len();
        self.buf.push(tag);
        self.buf.extend_from_slice(&[0u8; 4]); // byte-length placeholder
        self.buf.extend_from_slice(&[0u8; 4]); // count placeholder
        self.stack.push(OpenContainer {
            start,
            kind,
            count: 0,
        });
    }

    pub fn open_array(&mut self) {
        self.open(super::TAG_ARRAY, ContainerKind::Array);
    }

    pub fn open_object(&mut self) {
        self.open(super::TAG_OBJECT, ContainerKind::Object);
    }

    fn close(&mut self, expected: &str, is_expected: impl Fn(&ContainerKind) -> bool) {
        let frame = self
            .stack
            .pop()
            .unwrap_or_else(|| panic!("close_{expected} called with no open container"));
        assert!(
            is_expected(&frame.kind),
            "mismatched close_{expected}: innermost open container is not a {expected}"
        );
        let total_len = (self.buf.len() - frame.start) as u32;
        self.buf[frame.start + 1..frame.start + 5].copy_from_slice(&total_len.to_le_bytes());
        self.buf[frame.start + 5..frame.start + 9].copy_from_slice(&frame.count.to_le_bytes());
        // The container just closed counts as one member of its own parent.
        self.count_one();
    }

    pub fn close_array(&mut self) {
        self.close("array", |k| matches!(k, ContainerKind::Array));
    }

    pub fn close_object(&mut self) {
        self.close("object", |k| matches!(k, ContainerKind::Object));
    }

    /// Finalizes the buffer. Panics if a container was left open.
    pub fn finish(self) -> Vec<u8> {
        assert!(
            self.stack.is_empty(),
            "Builder::finish called with unclosed containers"
        );
        self.buf
    }

    /// Borrows the buffer built so far as a [`super::Slice`], without
    /// consuming the builder. Only valid once all containers are closed.
    pub fn as_slice(&self) -> super::Slice<'_> {
        assert!(
            self.stack.is_empty(),
            "Builder::as_slice called with unclosed containers"
        );
        super::Slice::new(&self.buf).expect("builder always produces a well-formed slice")
    }
}
