//! Kernel structures and ioctl calls of the HCI sockets
//!
//! These structures are laid out the same as the ones in the BlueZ headers (`hci.h`), the
//! flexible array members of the list requests are given a fixed length.

#![allow(non_camel_case_types)]

use crate::consts::{
    HCIDEVDOWN, HCIDEVRESET, HCIDEVRESTAT, HCIDEVUP, HCIGETCONNINFO, HCIGETCONNLIST, HCIGETDEVINFO, HCIGETDEVLIST,
    HCIINQUIRY, HCI_IOC_MAGIC, HCI_MAX_DEV,
};
use nix::libc::{c_int, c_void};
use std::mem::size_of;

/// The maximum number of connections read by `HCIGETCONNLIST`
pub const HCI_MAX_CONN: usize = 20;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_dev_req {
    pub dev_id: u16,
    pub dev_opt: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_dev_list_req {
    pub dev_num: u16,
    pub dev_req: [hci_dev_req; HCI_MAX_DEV],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_dev_stats {
    pub err_rx: u32,
    pub err_tx: u32,
    pub cmd_tx: u32,
    pub evt_rx: u32,
    pub acl_tx: u32,
    pub acl_rx: u32,
    pub sco_tx: u32,
    pub sco_rx: u32,
    pub byte_rx: u32,
    pub byte_tx: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_dev_info {
    pub dev_id: u16,
    pub name: [u8; 8],
    pub bdaddr: [u8; 6],
    pub flags: u32,
    pub type_: u8,
    pub features: [u8; 8],
    pub pkt_type: u32,
    pub link_policy: u32,
    pub link_mode: u32,
    pub acl_mtu: u16,
    pub acl_pkts: u16,
    pub sco_mtu: u16,
    pub sco_pkts: u16,
    pub stat: hci_dev_stats,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_conn_info {
    pub handle: u16,
    pub bdaddr: [u8; 6],
    pub type_: u8,
    pub out: u8,
    pub state: u16,
    pub link_mode: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_conn_list_req {
    pub dev_id: u16,
    pub conn_num: u16,
    pub conn_info: [hci_conn_info; HCI_MAX_CONN],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct hci_conn_info_req {
    pub bdaddr: [u8; 6],
    pub type_: u8,
    pub conn_info: hci_conn_info,
}

nix::ioctl_write_int!(hci_dev_up, HCI_IOC_MAGIC, HCIDEVUP);
nix::ioctl_write_int!(hci_dev_down, HCI_IOC_MAGIC, HCIDEVDOWN);
nix::ioctl_write_int!(hci_dev_reset, HCI_IOC_MAGIC, HCIDEVRESET);
nix::ioctl_write_int!(hci_dev_reset_stats, HCI_IOC_MAGIC, HCIDEVRESTAT);

// The request codes of the ioctls below are declared with the size of an `int` even though the
// argument is a pointer to a structure, so nix's ioctl_read! macros cannot be used for them.

unsafe fn hci_ioctl_read(fd: c_int, nr: u8, arg: *mut c_void) -> nix::Result<c_int> {
    let request_code = nix::request_code_read!(HCI_IOC_MAGIC, nr, size_of::<c_int>());

    nix::errno::Errno::result(nix::libc::ioctl(fd, request_code, arg))
}

unsafe fn hci_ioctl_write(fd: c_int, nr: u8, arg: *mut c_void) -> nix::Result<c_int> {
    let request_code = nix::request_code_write!(HCI_IOC_MAGIC, nr, size_of::<c_int>());

    nix::errno::Errno::result(nix::libc::ioctl(fd, request_code, arg))
}

pub unsafe fn hci_get_dev_list(fd: c_int, req: &mut hci_dev_list_req) -> nix::Result<c_int> {
    hci_ioctl_read(fd, HCIGETDEVLIST, req as *mut _ as *mut c_void)
}

pub unsafe fn hci_get_dev_info(fd: c_int, info: &mut hci_dev_info) -> nix::Result<c_int> {
    hci_ioctl_read(fd, HCIGETDEVINFO, info as *mut _ as *mut c_void)
}

pub unsafe fn hci_get_conn_list(fd: c_int, req: &mut hci_conn_list_req) -> nix::Result<c_int> {
    hci_ioctl_read(fd, HCIGETCONNLIST, req as *mut _ as *mut c_void)
}

pub unsafe fn hci_get_conn_info(fd: c_int, req: &mut hci_conn_info_req) -> nix::Result<c_int> {
    hci_ioctl_read(fd, HCIGETCONNINFO, req as *mut _ as *mut c_void)
}

/// Perform an inquiry
///
/// `buffer` must be a buffer created by `InquiryRequest::to_buffer`.
pub unsafe fn hci_inquiry(fd: c_int, buffer: &mut [u8]) -> nix::Result<c_int> {
    hci_ioctl_read(fd, HCIINQUIRY, buffer.as_mut_ptr() as *mut c_void)
}

/// Perform one of the `HCISET*` ioctls
pub unsafe fn hci_dev_cmd(fd: c_int, nr: u8, req: &mut hci_dev_req) -> nix::Result<c_int> {
    hci_ioctl_write(fd, nr, req as *mut _ as *mut c_void)
}
