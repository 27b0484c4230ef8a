use std::cell::RefCell;
use std::rc::Rc;

/// Fallback bus capability for addresses with no direct page mapping.
///
/// A platform implements this for whatever sits outside plain RAM/ROM on
/// its board: I/O pages, video-chip registers, bank latches. The router
/// consults it only after the page tables miss; with no responder installed
/// the defaults below apply (reads see 0, writes vanish).
pub trait BusResponder {
    /// Data or instruction read from an unmapped physical address.
    fn read(&mut self, addr: u32) -> u8 {
        let _ = addr;
        0
    }

    /// Data write to an unmapped physical address.
    fn write(&mut self, addr: u32, data: u8) {
        let _ = (addr, data);
    }

    /// Write on the 8-bit port side channel (ST0/ST1/ST2 on the HuC6280).
    fn write_port(&mut self, port: u8, data: u8) {
        let _ = (port, data);
    }
}

/// Shared handle to a responder, for boards that need to keep inspecting
/// device state after handing the responder to a CPU instance.
///
/// The execution model is single-threaded and cooperative, so `Rc<RefCell>`
/// suffices; the `RefCell` is only borrowed for the duration of one bus
/// access.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    pub fn handle(&self) -> Rc<RefCell<T>> {
        Rc::clone(&self.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: BusResponder> BusResponder for Shared<T> {
    fn read(&mut self, addr: u32) -> u8 {
        self.0.borrow_mut().read(addr)
    }

    fn write(&mut self, addr: u32, data: u8) {
        self.0.borrow_mut().write(addr, data)
    }

    fn write_port(&mut self, port: u8, data: u8) {
        self.0.borrow_mut().write_port(port, data)
    }
}
