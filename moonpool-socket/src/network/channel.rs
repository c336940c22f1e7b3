use super::pipe::{pipe, PipeReader, PipeWriter, ReadOutcome};
use crate::error::SocketResult;
use crate::time::Deadline;

/// One side's access to an established connection: the read end of the
/// peer's pipe and the write end of its own.
#[derive(Debug)]
pub(crate) struct DuplexChannel {
    reader: PipeReader,
    writer: PipeWriter,
}

impl DuplexChannel {
    /// Build the cross-wired `(server, client)` pair for one connection.
    ///
    /// Pipe A carries server→client bytes, pipe B client→server.
    pub(crate) fn pair(capacity: usize) -> (DuplexChannel, DuplexChannel) {
        let (a_writer, a_reader) = pipe(capacity);
        let (b_writer, b_reader) = pipe(capacity);
        let server = DuplexChannel {
            reader: b_reader,
            writer: a_writer,
        };
        let client = DuplexChannel {
            reader: a_reader,
            writer: b_writer,
        };
        (server, client)
    }

    pub(crate) fn read(&self, buf: &mut [u8], deadline: Deadline) -> SocketResult<ReadOutcome> {
        self.reader.read(buf, deadline)
    }

    pub(crate) fn write(&self, data: &[u8]) -> SocketResult<usize> {
        self.writer.write(data)
    }

    pub(crate) fn available(&self) -> usize {
        self.reader.available()
    }

    /// Close the read end; the peer's writes start failing.
    pub(crate) fn close_read(&self) -> bool {
        self.reader.close()
    }

    /// Close the write end; the peer reads end-of-stream after draining.
    pub(crate) fn close_write(&self) -> bool {
        self.writer.close()
    }
}
