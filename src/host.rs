/**
    host-facing side of the bridge, typically a usb virtual serial port

    the transport moves bytes in frames of at most [frame_size](Self::frame_size) bytes. A frame shorter than that size marks the end of a transfer, so a transfer ending exactly on a frame boundary must be followed by an empty frame.
*/
pub trait HostTransport {
    /// the host has configured the link, nothing is serviced before that
    fn is_connected(&self) -> bool;
    /// number of bytes received from the host and not consumed yet
    fn bytes_available(&self) -> usize;
    /// consume one byte received from the host
    fn receive_byte(&mut self) -> Option<u8>;
    /// the outbound frame can be filled
    fn is_write_ready(&self) -> bool;
    /// append a byte to the outbound frame
    fn write_byte(&mut self, byte: u8);
    /// hand the outbound frame to the transport, it may be empty
    fn commit_frame(&mut self);
    /// maximum number of bytes in an outbound frame
    fn frame_size(&self) -> usize;
}
