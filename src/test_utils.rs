//! In-memory stand-ins for the device, ring, completion queues, buffer pool
//! and event handler. Every call is recorded so tests can check ordering,
//! and most calls can be made to fail.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::QpConfig;
use crate::ctrl::EventHandler;
use crate::rdma::buf::*;
use crate::rdma::context::*;
use crate::rdma::cq::*;
use crate::rdma::flow::FlowAttr;
use crate::rdma::qp::*;
use crate::rdma::ratelimit::*;
use crate::rdma::ring::Ring;
use crate::rdma::type_alias::*;
use crate::rdma::verbs::*;
use crate::rdma::wr::*;

/// Call log shared by all mocks of a fixture.
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn note(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

#[derive(Default)]
pub(crate) struct MockDeviceState {
    pub next_qpn: Qpn,
    pub qps: HashMap<u64, QpState>,
    pub created: Vec<QpInitAttr>,
    pub destroyed: Vec<QpHandle>,
    pub transitions: Vec<QpTransition>,
    pub recv_posts: Vec<Vec<WrId>>,
    pub sends: Vec<SendWr>,
    pub rate_limits: Vec<(RateLimit, RateLimitChanges)>,
    pub lag_port: Option<PortNum>,
    pub flows_created: Vec<FlowAttr>,
    pub flows_destroyed: Vec<FlowHandle>,

    /// Capabilities reported after creation. Defaults to the requested ones.
    pub granted: Option<QpCaps>,

    pub fail_create_qp: bool,
    pub fail_query_caps: bool,
    pub fail_transition_to: Option<QpState>,
    /// One-shot: cut the next receive chain at this index and fail.
    pub fail_post_recv_at: Option<usize>,
    pub fail_post_send: bool,
    pub fail_rate_limit: bool,
    pub fail_lag: bool,
    pub fail_flow: bool,
    pub destroy_errno: Option<i32>,
    pub rq_empty: bool,
}

pub(crate) struct MockDevice {
    name: String,
    attr: DeviceAttr,
    removed: Arc<AtomicBool>,
    journal: Journal,
    state: Mutex<MockDeviceState>,
}

impl MockDevice {
    pub fn new(name: &str, max_qp_wr: u32, journal: Journal) -> Self {
        Self {
            name: name.to_string(),
            attr: DeviceAttr {
                max_qp_wr,
                max_sge: 30,
                max_cqe: 4194303,
            },
            removed: Arc::new(AtomicBool::new(false)),
            journal,
            state: Mutex::new(MockDeviceState {
                next_qpn: 0x100,
                ..Default::default()
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockDeviceState> {
        self.state.lock().unwrap()
    }

    pub fn removed_flag(&self) -> Arc<AtomicBool> {
        self.removed.clone()
    }
}

fn transition_allowed(from: QpState, transition: QpTransition) -> bool {
    match transition {
        QpTransition::ToInit { .. } => {
            matches!(from, QpState::Reset | QpState::Init | QpState::Error)
        }
        QpTransition::ToRtr => from == QpState::Init,
        QpTransition::ToRts => from == QpState::Rtr,
        QpTransition::ToError => true,
    }
}

impl Verbs for MockDevice {
    fn create_qp(&self, init_attr: &QpInitAttr) -> io::Result<QpHandle> {
        let mut st = self.state();
        if st.fail_create_qp {
            return Err(errno(libc::ENOMEM));
        }
        let qpn = st.next_qpn;
        st.next_qpn += 1;
        let handle = QpHandle {
            raw: qpn as u64,
            qpn,
        };
        st.qps.insert(handle.raw, QpState::Reset);
        st.created.push(init_attr.clone());
        Ok(handle)
    }

    fn destroy_qp(&self, qp: QpHandle) -> io::Result<()> {
        let mut st = self.state();
        st.destroyed.push(qp);
        st.qps.remove(&qp.raw);
        match st.destroy_errno {
            Some(code) => Err(errno(code)),
            None => Ok(()),
        }
    }

    fn query_qp_state(&self, qp: QpHandle) -> io::Result<QpState> {
        self.state()
            .qps
            .get(&qp.raw)
            .copied()
            .ok_or_else(|| errno(libc::EINVAL))
    }

    fn query_qp_caps(&self, _qp: QpHandle) -> io::Result<QpCaps> {
        let st = self.state();
        if st.fail_query_caps {
            return Err(errno(libc::EINVAL));
        }
        match st.granted {
            Some(caps) => Ok(caps),
            None => st
                .created
                .last()
                .map(|attr| attr.caps)
                .ok_or_else(|| errno(libc::EINVAL)),
        }
    }

    fn modify_qp(&self, qp: QpHandle, transition: QpTransition) -> io::Result<()> {
        note(&self.journal, format!("modify {:?}", transition));
        let mut st = self.state();
        st.transitions.push(transition);

        let from = *st.qps.get(&qp.raw).ok_or_else(|| errno(libc::EINVAL))?;
        if st.fail_transition_to == Some(transition.target()) || !transition_allowed(from, transition)
        {
            return Err(errno(libc::EINVAL));
        }
        st.qps.insert(qp.raw, transition.target());
        Ok(())
    }

    fn post_recv(&self, _qp: QpHandle, wrs: &mut [RecvWr]) -> Result<(), PostRecvError> {
        note(&self.journal, "post_recv");
        let mut st = self.state();
        let fail_at = st.fail_post_recv_at.take();

        let posted = recv_chain(wrs)
            .take_while(|(idx, _)| Some(*idx) != fail_at)
            .map(|(_, wr)| wr.wr_id)
            .collect();
        st.recv_posts.push(posted);

        match fail_at {
            Some(bad_index) => {
                wrs[bad_index].next = None;
                Err(PostRecvError {
                    bad_index,
                    source: errno(libc::EINVAL),
                })
            }
            None => Ok(()),
        }
    }

    fn post_send(&self, _qp: QpHandle, wr: &SendWr) -> io::Result<()> {
        note(&self.journal, "post_send");
        let mut st = self.state();
        if st.fail_post_send {
            return Err(errno(libc::ENOMEM));
        }
        st.sends.push(wr.clone());
        Ok(())
    }

    fn modify_rate_limit(
        &self,
        _qp: QpHandle,
        rate_limit: &RateLimit,
        changes: RateLimitChanges,
    ) -> io::Result<()> {
        let mut st = self.state();
        if st.fail_rate_limit {
            return Err(errno(libc::EINVAL));
        }
        st.rate_limits.push((*rate_limit, changes));
        Ok(())
    }

    fn modify_qp_lag_port(&self, _qp: QpHandle, port: PortNum) -> io::Result<()> {
        let mut st = self.state();
        if st.fail_lag {
            return Err(errno(libc::EOPNOTSUPP));
        }
        st.lag_port = Some(port);
        Ok(())
    }

    fn query_qp_lag_port(&self, _qp: QpHandle) -> io::Result<(PortNum, PortNum)> {
        let port = self.state().lag_port.unwrap_or(1);
        Ok((port, port))
    }

    fn create_flow(&self, _qp: QpHandle, attr: &FlowAttr) -> io::Result<FlowHandle> {
        let mut st = self.state();
        if st.fail_flow {
            return Err(errno(libc::EINVAL));
        }
        st.flows_created.push(attr.clone());
        Ok(FlowHandle(st.flows_created.len() as u64))
    }

    fn destroy_flow(&self, flow: FlowHandle) -> io::Result<()> {
        self.state().flows_destroyed.push(flow);
        Ok(())
    }

    fn rq_is_empty(&self, _qp: QpHandle) -> bool {
        self.state().rq_empty
    }
}

impl DeviceContext for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn attr(&self) -> DeviceAttr {
        self.attr
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    fn async_fd(&self) -> RawFd {
        42
    }

    fn num_lag_ports(&self) -> io::Result<u8> {
        Ok(2)
    }
}

/// One scripted receive drain pass.
pub(crate) struct RxStep {
    pub processed: usize,
    pub last: Option<WrId>,
    pub errno: Option<i32>,
    pub then_remove: Option<Arc<AtomicBool>>,
}

impl RxStep {
    pub fn completes(processed: usize, last: WrId) -> Self {
        Self {
            processed,
            last: Some(last),
            errno: None,
            then_remove: None,
        }
    }

    pub fn idle() -> Self {
        Self {
            processed: 0,
            last: None,
            errno: None,
            then_remove: None,
        }
    }

    pub fn removing_device(mut self, flag: Arc<AtomicBool>) -> Self {
        self.then_remove = Some(flag);
        self
    }
}

#[derive(Default)]
pub(crate) struct MockCqState {
    pub tx_qps: Vec<Qpn>,
    pub rx_qps: Vec<Qpn>,
    pub tx_polls: usize,
    pub rx_drains: usize,

    /// Results of send polling passes. `Ok(0)` once exhausted.
    pub tx_script: VecDeque<Result<usize, i32>>,

    /// Receive drain passes. Once exhausted, passes fail with `EIO` so that
    /// drain loops always terminate.
    pub rx_script: VecDeque<RxStep>,
}

pub(crate) struct MockCq {
    dir: CqDirection,
    handle: CqHandle,
    channel: Option<RawFd>,
    journal: Journal,
    state: Arc<Mutex<MockCqState>>,
}

impl CompletionQueue for MockCq {
    fn handle(&self) -> CqHandle {
        self.handle
    }

    fn channel_fd(&self) -> Option<RawFd> {
        self.channel
    }

    fn add_qp_tx(&mut self, qpn: Qpn) {
        note(&self.journal, format!("{} add_qp_tx", self.dir));
        self.state.lock().unwrap().tx_qps.push(qpn);
    }

    fn del_qp_tx(&mut self, qpn: Qpn) {
        note(&self.journal, format!("{} del_qp_tx", self.dir));
        self.state.lock().unwrap().tx_qps.retain(|q| *q != qpn);
    }

    fn add_qp_rx(&mut self, qpn: Qpn) {
        note(&self.journal, format!("{} add_qp_rx", self.dir));
        self.state.lock().unwrap().rx_qps.push(qpn);
    }

    fn del_qp_rx(&mut self, qpn: Qpn) {
        note(&self.journal, format!("{} del_qp_rx", self.dir));
        self.state.lock().unwrap().rx_qps.retain(|q| *q != qpn);
    }

    fn poll_and_process_tx(&mut self, poll_sn: &mut u64) -> io::Result<usize> {
        note(&self.journal, "poll_tx");
        let mut st = self.state.lock().unwrap();
        st.tx_polls += 1;
        *poll_sn += 1;
        match st.tx_script.pop_front() {
            Some(Ok(n)) => Ok(n),
            Some(Err(code)) => Err(errno(code)),
            None => Ok(0),
        }
    }

    fn drain_and_process_rx(&mut self, last_polled: &mut Option<WrId>) -> io::Result<usize> {
        note(&self.journal, "drain_rx");
        let mut st = self.state.lock().unwrap();
        st.rx_drains += 1;
        let Some(step) = st.rx_script.pop_front() else {
            return Err(errno(libc::EIO));
        };
        if let Some(flag) = step.then_remove {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(code) = step.errno {
            return Err(errno(code));
        }
        if step.last.is_some() {
            *last_polled = step.last;
        }
        Ok(step.processed)
    }
}

#[derive(Default)]
pub(crate) struct MockRingState {
    pub cq_requests: Vec<(CqDirection, u32)>,
    pub cqs: Vec<(CqDirection, Arc<Mutex<MockCqState>>)>,
    pub returned_rx: Vec<BufferDesc>,
    pub returned_tx: Vec<BufferDesc>,
    pub tx_acquired: Vec<(u32, bool)>,
    pub tx_memory: Vec<Box<[u8]>>,
    pub missing_buf_refs: i32,
}

pub(crate) struct MockRing {
    tso: Option<u32>,
    socketxtreme: bool,
    tx_buffers: bool,
    tx_buffer_len: Option<u32>,
    max_cq_size: Option<u32>,
    fail_cq: Option<CqDirection>,
    pub journal: Journal,
    state: Mutex<MockRingState>,
}

pub(crate) const MOCK_TX_LKEY: LKey = 0x77;

impl MockRing {
    pub fn new() -> Self {
        Self {
            tso: None,
            socketxtreme: false,
            tx_buffers: true,
            tx_buffer_len: None,
            max_cq_size: None,
            fail_cq: None,
            journal: Journal::default(),
            state: Mutex::default(),
        }
    }

    pub fn tso(mut self, max_header: u32) -> Self {
        self.tso = Some(max_header);
        self
    }

    pub fn socketxtreme(mut self) -> Self {
        self.socketxtreme = true;
        self
    }

    pub fn without_tx_buffers(mut self) -> Self {
        self.tx_buffers = false;
        self
    }

    /// Hand out transmit buffers of exactly `len` bytes.
    pub fn tx_buffer_len(mut self, len: u32) -> Self {
        self.tx_buffer_len = Some(len);
        self
    }

    pub fn max_cq_size(mut self, size: u32) -> Self {
        self.max_cq_size = Some(size);
        self
    }

    pub fn failing_cq(mut self, dir: CqDirection) -> Self {
        self.fail_cq = Some(dir);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockRingState> {
        self.state.lock().unwrap()
    }

    pub fn cq(&self, dir: CqDirection) -> Arc<Mutex<MockCqState>> {
        self.state()
            .cqs
            .iter()
            .rev()
            .find(|(d, _)| *d == dir)
            .map(|(_, cq)| cq.clone())
            .unwrap()
    }
}

impl Ring for MockRing {
    fn transport_type(&self) -> TransportType {
        TransportType::Ethernet
    }

    fn is_tso(&self) -> bool {
        self.tso.is_some()
    }

    fn max_tso_header_size(&self) -> u32 {
        self.tso.unwrap_or(0)
    }

    fn is_socketxtreme(&self) -> bool {
        self.socketxtreme
    }

    fn tx_lkey(&self) -> LKey {
        MOCK_TX_LKEY
    }

    fn tx_comp_channel(&self) -> Option<RawFd> {
        None
    }

    fn return_buffer_to_owner_rx(&self, desc: BufferDesc) {
        self.state().returned_rx.push(desc);
    }

    fn acquire_tx_buffer(&self, min_size: u32, urgent: bool) -> Option<BufferDesc> {
        note(&self.journal, "acquire_tx_buffer");
        let mut st = self.state();
        st.tx_acquired.push((min_size, urgent));
        if !self.tx_buffers {
            return None;
        }

        let len = self.tx_buffer_len.unwrap_or(min_size.max(64));
        let mut mem = vec![0xa5u8; len as usize].into_boxed_slice();
        let addr = mem.as_mut_ptr() as u64;
        st.tx_memory.push(mem);
        Some(BufferDesc {
            id: BufId(0x1000 + st.tx_memory.len() as u64),
            addr,
            len,
            lkey: MOCK_TX_LKEY,
            owned_by_ring: true,
            flags: BufFlags::empty(),
        })
    }

    fn return_tx_buffer(&self, desc: BufferDesc) {
        self.state().returned_tx.push(desc);
    }

    fn adjust_missing_buf_refs(&self, delta: i32) {
        self.state().missing_buf_refs += delta;
    }

    fn create_cq(
        &self,
        _ctx: &Arc<dyn DeviceContext>,
        num_wr: u32,
        channel: Option<RawFd>,
        dir: CqDirection,
    ) -> Result<Box<dyn CompletionQueue>, CqCreationError> {
        let mut st = self.state();
        st.cq_requests.push((dir, num_wr));
        if self.fail_cq == Some(dir) {
            return Err(CqCreationError::Io(errno(libc::ENOMEM)));
        }
        if let Some(max) = self.max_cq_size {
            if num_wr > max {
                return Err(CqCreationError::TooManyCqes(max));
            }
        }

        let state = Arc::new(Mutex::new(MockCqState::default()));
        st.cqs.push((dir, state.clone()));
        Ok(Box::new(MockCq {
            dir,
            handle: CqHandle(st.cqs.len() as u64),
            channel,
            journal: self.journal.clone(),
            state,
        }))
    }
}

#[derive(Default)]
pub(crate) struct MockPool {
    pub returned: Mutex<Vec<Vec<BufferDesc>>>,
    pub links: Mutex<Vec<(BufId, Option<BufId>)>>,
}

impl BufferPool for MockPool {
    fn put_buffers_thread_safe(&self, bufs: Vec<BufferDesc>) {
        self.returned.lock().unwrap().push(bufs);
    }

    fn free_count(&self) -> usize {
        1024
    }

    fn link_prefetch(&self, from: BufId, to: Option<BufId>) {
        self.links.lock().unwrap().push((from, to));
    }
}

#[derive(Default)]
pub(crate) struct MockEvents {
    pub queries: Mutex<Vec<RawFd>>,
}

impl EventHandler for MockEvents {
    fn query_for_ibverbs_event(&self, async_fd: RawFd) {
        self.queries.lock().unwrap().push(async_fd);
    }
}

/// A device, ring, pool and event handler wired together.
pub(crate) struct Fixture {
    pub dev: Arc<MockDevice>,
    pub ring: Arc<MockRing>,
    pub pool: Arc<MockPool>,
    pub events: Arc<MockEvents>,
    pub journal: Journal,
}

pub(crate) const TX_NUM_WR: u32 = 2048;

impl Fixture {
    pub fn new() -> Self {
        Self::with_ring(MockRing::new())
    }

    pub fn with_ring(ring: MockRing) -> Self {
        Self::build("mlx5_0", 16384, ring)
    }

    pub fn build(dev_name: &str, max_qp_wr: u32, ring: MockRing) -> Self {
        let journal = ring.journal.clone();
        Self {
            dev: Arc::new(MockDevice::new(dev_name, max_qp_wr, journal.clone())),
            ring: Arc::new(ring),
            pool: Arc::default(),
            events: Arc::default(),
            journal,
        }
    }

    pub fn desc(&self) -> QpMgrDesc {
        QpMgrDesc {
            ctx: self.dev.clone(),
            ring: self.ring.clone(),
            pool: self.pool.clone(),
            events: self.events.clone(),
            port_num: 1,
            lag_tx_port_affinity: 0,
            rx_comp_channel: None,
        }
    }

    pub fn mgr(&self, config: QpConfig) -> EthQpMgr {
        EthQpMgr::new(self.desc(), TX_NUM_WR, config)
    }

    pub fn configured(&self, config: QpConfig) -> EthQpMgr {
        let mut mgr = self.mgr(config);
        mgr.configure().unwrap();
        mgr
    }

    pub fn tx_cq(&self) -> Arc<Mutex<MockCqState>> {
        self.ring.cq(CqDirection::Tx)
    }

    pub fn rx_cq(&self) -> Arc<Mutex<MockCqState>> {
        self.ring.cq(CqDirection::Rx)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Position of the first journal entry equal to `entry`.
    pub fn journal_pos(&self, entry: &str) -> usize {
        self.journal()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("no journal entry {:?}", entry))
    }
}

/// Tunables small enough to exercise batching and signaling, with no
/// sleeping in drain loops.
pub(crate) fn small_config() -> QpConfig {
    QpConfig {
        rx_num_wr: 256,
        rx_num_wr_to_post_recv: 4,
        tx_num_wr_to_signal: 4,
        rx_drain_interval_us: 0,
        down_settle_us: 0,
        ..QpConfig::default()
    }
}

pub(crate) fn rx_desc(id: u64, owned_by_ring: bool) -> BufferDesc {
    BufferDesc {
        id: BufId(id),
        addr: 0x10_0000 + 0x800 * id,
        len: 2048,
        lkey: 0x11,
        owned_by_ring,
        flags: BufFlags::empty(),
    }
}

pub(crate) fn tx_wr(id: u64, zero_copy: bool) -> SendWr {
    let mut wr = SendWr::new(id).sge(Sge {
        addr: 0x20_0000 + 0x800 * id,
        length: 128,
        lkey: MOCK_TX_LKEY,
    });
    wr.zero_copy = zero_copy;
    wr
}
