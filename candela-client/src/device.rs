//! Device facade
//!
//! One [`Device`] per connection: it owns the transport and the frame
//! parser, so parser state is exclusively held by whoever holds the
//! device (single-writer discipline, enforced by `&mut self`).

use heapless::Vec;

use candela_image::{
    quantize, ImageBuffer, ImageError, MatrixSize, PaletteTier,
};
use candela_protocol::{
    Animation, Command, CommandError, DateTime, DeviceEvent, DisplayMode, Frame, FrameError,
    FrameParser, ImageFrame, MAX_ANIMATION_FRAMES,
};

use crate::transport::Transport;

/// Bytes of response data read before giving up on an acknowledgement
const RESPONSE_READ_BUDGET: usize = 512;

/// Errors surfaced by the device facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError<E> {
    /// The transport failed to move bytes
    Transport(E),
    /// Image validation or quantization failed
    Image(ImageError),
    /// Command validation or encoding failed
    Command(CommandError),
    /// Frame encoding failed
    Frame(FrameError),
    /// No acknowledgement arrived within the read budget
    NoResponse,
}

impl<E> From<ImageError> for DeviceError<E> {
    fn from(err: ImageError) -> Self {
        DeviceError::Image(err)
    }
}

impl<E> From<CommandError> for DeviceError<E> {
    fn from(err: CommandError) -> Self {
        DeviceError::Command(err)
    }
}

impl<E> From<FrameError> for DeviceError<E> {
    fn from(err: FrameError) -> Self {
        DeviceError::Frame(err)
    }
}

/// A connected display
pub struct Device<T: Transport> {
    transport: T,
    matrix: MatrixSize,
    parser: FrameParser,
}

impl<T: Transport> Device<T> {
    /// Wrap a transport for a device with the given matrix size
    pub fn new(transport: T, matrix: MatrixSize) -> Self {
        Self {
            transport,
            matrix,
            parser: FrameParser::new(),
        }
    }

    /// Matrix size this device was configured with
    pub fn matrix(&self) -> MatrixSize {
        self.matrix
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Quantize an image to the given tier and display it
    ///
    /// The image must match the device matrix; scaling is the caller's
    /// explicit pre-processing step.
    pub fn display_image(
        &mut self,
        image: &ImageBuffer,
        tier: PaletteTier,
        duration_ms: u16,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        let (palette, grid) = quantize(image, self.matrix, tier)?;
        self.send(&Command::DisplayImage(ImageFrame {
            palette,
            grid,
            duration_ms,
        }))
    }

    /// Quantize a sequence of images and play them as an animation
    pub fn play_animation(
        &mut self,
        images: &[ImageBuffer],
        tier: PaletteTier,
        frame_duration_ms: u16,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        let mut frames: Vec<ImageFrame, MAX_ANIMATION_FRAMES> = Vec::new();
        for image in images {
            let (palette, grid) = quantize(image, self.matrix, tier)?;
            frames
                .push(ImageFrame {
                    palette,
                    grid,
                    duration_ms: frame_duration_ms,
                })
                .map_err(|_| DeviceError::Command(CommandError::PayloadTooLarge))?;
        }
        let animation = Animation::from_frames(&frames)?;
        self.send(&Command::PlayAnimation(animation))
    }

    /// Set panel brightness, 0-100 percent
    pub fn set_brightness(
        &mut self,
        percent: u8,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        self.send(&Command::SetBrightness(percent))
    }

    /// Switch to a built-in display mode
    pub fn set_mode(
        &mut self,
        mode: DisplayMode,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        self.send(&Command::SetMode(mode))
    }

    /// Set the device wall clock
    pub fn set_time(
        &mut self,
        time: DateTime,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        self.send(&Command::SetTime(time))
    }

    /// Encode, frame and send a command; collect the acknowledgement when
    /// the command expects one
    pub fn send(
        &mut self,
        command: &Command,
    ) -> Result<Option<DeviceEvent>, DeviceError<T::Error>> {
        let frame = command.to_frame()?;
        let bytes = frame.encode_to_vec()?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "sending {=usize} byte frame, opcode {=u8:#04x}",
            bytes.len(),
            frame.command
        );

        self.transport
            .send(&bytes)
            .map_err(DeviceError::Transport)?;

        if !command.expects_response() {
            return Ok(None);
        }
        self.read_event().map(Some)
    }

    /// Pump received bytes through the parser until a frame decodes
    ///
    /// Corrupted frames are dropped by the parser, which resynchronizes
    /// on its own; only transport failure or an exhausted read budget
    /// end the wait.
    fn read_event(&mut self) -> Result<DeviceEvent, DeviceError<T::Error>> {
        let mut budget = RESPONSE_READ_BUDGET;
        let mut buf = [0u8; 64];
        while budget > 0 {
            let chunk = buf.len().min(budget);
            let n = self
                .transport
                .receive(&mut buf[..chunk])
                .map_err(DeviceError::Transport)?;
            if n == 0 {
                return Err(DeviceError::NoResponse);
            }
            budget -= n;
            for &byte in &buf[..n] {
                match self.parser.feed(byte) {
                    Ok(Some(frame)) => return self.decode_event(&frame),
                    Ok(None) => {}
                    Err(_err) => {
                        // Recoverable framing error; the parser resynced
                        #[cfg(feature = "defmt")]
                        defmt::debug!("dropped corrupt frame: {}", _err);
                    }
                }
            }
        }
        Err(DeviceError::NoResponse)
    }

    fn decode_event(&self, frame: &Frame) -> Result<DeviceEvent, DeviceError<T::Error>> {
        DeviceEvent::from_frame(frame).map_err(DeviceError::Command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candela_protocol::command::CMD_SET_BRIGHTNESS;
    use candela_protocol::AckStatus;
    use core::convert::Infallible;
    use rgb::RGB8;
    use std::collections::VecDeque;

    /// In-memory loopback implementing the embedded-io traits, so these
    /// tests also exercise the blanket `Transport` impl.
    #[derive(Default)]
    struct MockLink {
        sent: std::vec::Vec<u8>,
        rx: VecDeque<u8>,
    }

    impl MockLink {
        fn with_response(frame: &Frame) -> Self {
            let mut link = Self::default();
            link.rx.extend(frame.encode_to_vec().unwrap());
            link
        }
    }

    impl embedded_io::ErrorType for MockLink {
        type Error = Infallible;
    }

    impl embedded_io::Read for MockLink {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl embedded_io::Write for MockLink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn ack(command: u8) -> Frame {
        DeviceEvent::Ack {
            command,
            status: AckStatus::Ok,
        }
        .to_frame()
        .unwrap()
    }

    #[test]
    fn test_set_brightness_sends_frame_and_reads_ack() {
        let link = MockLink::with_response(&ack(CMD_SET_BRIGHTNESS));
        let mut device = Device::new(link, MatrixSize::SQUARE_16);

        let event = device.set_brightness(80).unwrap();
        assert_eq!(
            event,
            Some(DeviceEvent::Ack {
                command: CMD_SET_BRIGHTNESS,
                status: AckStatus::Ok,
            })
        );

        let expected = Command::SetBrightness(80)
            .to_frame()
            .unwrap()
            .encode_to_vec()
            .unwrap();
        assert_eq!(&device.transport().sent[..], &expected[..]);
    }

    #[test]
    fn test_brightness_validation_sends_nothing() {
        let mut device = Device::new(MockLink::default(), MatrixSize::SQUARE_16);
        let result = device.set_brightness(150);
        assert_eq!(
            result,
            Err(DeviceError::Command(CommandError::OutOfRange))
        );
        assert!(device.transport().sent.is_empty());
    }

    #[test]
    fn test_no_response() {
        let mut device = Device::new(MockLink::default(), MatrixSize::SQUARE_16);
        assert_eq!(
            device.set_mode(DisplayMode::Clock),
            Err(DeviceError::NoResponse)
        );
    }

    #[test]
    fn test_resync_past_corrupt_response() {
        let good = ack(CMD_SET_BRIGHTNESS);
        let mut corrupt = good.encode_to_vec().unwrap();
        corrupt[4] ^= 0xff;

        let mut link = MockLink::default();
        link.rx.extend(corrupt.iter().copied());
        link.rx.extend(good.encode_to_vec().unwrap());

        let mut device = Device::new(link, MatrixSize::SQUARE_16);
        let event = device.set_brightness(10).unwrap();
        assert_eq!(
            event,
            Some(DeviceEvent::Ack {
                command: CMD_SET_BRIGHTNESS,
                status: AckStatus::Ok,
            })
        );
    }

    #[test]
    fn test_display_image_wire_bytes() {
        const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
        const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
        const ORANGE: RGB8 = RGB8 { r: 255, g: 85, b: 0 };
        const WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

        let mut pixels = std::vec::Vec::new();
        pixels.extend_from_slice(&[BLACK, RED, ORANGE, WHITE]);
        pixels.extend_from_slice(&[BLACK; 12]);
        for _ in 0..7 {
            pixels.extend_from_slice(&[BLACK; 8]);
            pixels.extend_from_slice(&[RED; 8]);
        }
        for _ in 0..8 {
            pixels.extend_from_slice(&[ORANGE; 8]);
            pixels.extend_from_slice(&[WHITE; 8]);
        }
        let image = ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap();

        let link = MockLink::with_response(&ack(0x44));
        let mut device = Device::new(link, MatrixSize::SQUARE_16);
        device
            .display_image(&image, PaletteTier::Colors4, 500)
            .unwrap();

        let sent = &device.transport().sent;
        assert_eq!(sent.len(), 94);
        assert_eq!(
            &sent[..8],
            &[0x01, 0x5a, 0x00, 0x44, 0x00, 0x0a, 0x0a, 0x04]
        );
        assert_eq!(&sent[91..], &[0x16, 0x28, 0x02]);
    }

    #[test]
    fn test_image_size_mismatch() {
        let image = ImageBuffer::new(MatrixSize::SQUARE_32).unwrap();
        let mut device = Device::new(MockLink::default(), MatrixSize::SQUARE_16);
        assert_eq!(
            device.display_image(&image, PaletteTier::Colors16, 100),
            Err(DeviceError::Image(ImageError::UnsupportedImageSize))
        );
    }

    #[test]
    fn test_animation_is_fire_and_forget() {
        // No scripted response, yet the call succeeds with None
        let frames = [
            ImageBuffer::filled(MatrixSize::SQUARE_16, RGB8::new(255, 0, 0)).unwrap(),
            ImageBuffer::filled(MatrixSize::SQUARE_16, RGB8::new(0, 0, 255)).unwrap(),
        ];
        let mut device = Device::new(MockLink::default(), MatrixSize::SQUARE_16);
        let event = device
            .play_animation(&frames, PaletteTier::Colors4, 120)
            .unwrap();
        assert_eq!(event, None);
        assert_eq!(device.transport().sent[3], 0x49);
    }
}
