use log::*;


/// where a restart leads
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Restart {
    /// run the bridge firmware again
    Application,
    /// enter the firmware update mode
    Bootloader,
}

/**
    control of the bridge execution

    on hardware [Lifecycle::restart] does not return, the relay core still behaves if it does
*/
pub trait Lifecycle {
    fn restart(&mut self, mode: Restart);
}


/**
    bootloader entry through the host link settings

    a host opening the link at [BootloadTrigger::BAUD] then closing it (dropping DTR) asks for the firmware update mode, without needing to speak the bus protocol.
*/
#[derive(Default, Debug)]
pub struct BootloadTrigger {
    armed: bool,
    dtr: bool,
}
impl BootloadTrigger {
    /// line speed reserved for the bootloader request
    pub const BAUD: u32 = 1200;

    pub const fn new() -> Self {
        Self {armed: false, dtr: false}
    }
    pub fn is_armed(&self) -> bool {self.armed}

    /// the host changed the line speed
    pub fn line_coding(&mut self, baud: u32) {
        if baud == Self::BAUD {
            debug!("bootloader request armed");
            self.armed = true;
        }
    }
    /// the host changed the control lines, returns the restart to perform if any
    pub fn control_lines(&mut self, dtr: bool) -> Option<Restart> {
        let closed = self.dtr && ! dtr;
        self.dtr = dtr;
        if closed && self.armed {
            info!("host closed link at bootloader speed");
            Some(Restart::Bootloader)
        }
        else {
            None
        }
    }
}
