use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::*;
use crate::config::{Hypervisor, QpConfig};
use crate::ctrl::{EventHandler, ShutdownSignal};
use crate::rdma::{
    buf::*,
    context::DeviceModel,
    cq::{CompletionQueue, CqDirection},
    flow::{FlowAttr, FlowRule, OffloadContext},
    ratelimit::{RateLimit, RateLimitChanges},
    ring::Ring,
    verbs::PostRecvError,
    wr::*,
};
use crate::utils::{fd::set_block_mode, interop::*, spin::SpinWarner};

/// Completion queue size to fall back to when creating a larger one fails
/// for mlx4 devices under Hyper-V.
const MAX_UPSTREAM_CQ_MSHV_SIZE: u32 = 8192;

/// Length of the frame sent to force a final send completion: an Ethernet
/// header and an IPv4 header.
const DUMMY_FRAME_LEN: u32 = 14 + 20;

/// Resources a queue pair manager is built on.
pub struct QpMgrDesc {
    /// Device to create the queue pair on.
    pub ctx: Arc<dyn DeviceContext>,

    /// The ring the queue pair serves.
    pub ring: Arc<dyn Ring>,

    /// The global receive buffer pool.
    pub pool: Arc<dyn BufferPool>,

    /// Asynchronous device event poller.
    pub events: Arc<dyn EventHandler>,

    /// Physical port number.
    pub port_num: PortNum,

    /// Link aggregation port to pin transmit traffic to, or 0 for none.
    pub lag_tx_port_affinity: PortNum,

    /// Receive completion notification channel.
    pub rx_comp_channel: Option<RawFd>,
}

/// Queue pair manager.
///
/// Owns one hardware queue pair and its two companion completion queues,
/// and drives the queue pair through its lifecycle:
///
/// - [`Self::configure`] negotiates capabilities, creates the completion
///   queues and the queue pair;
/// - [`Self::up`] registers with the completion queues and moves the queue
///   pair to RTS;
/// - [`Self::down`] moves the queue pair to ERR and drains both queues.
///
/// A manager is driven by one thread at a time. Receive buffers are only
/// borrowed while posted: they return to their owners through
/// [`Self::release_rx_buffers`] or the receive completion queue.
pub struct QpMgr<T: QpTransport> {
    transport: T,
    config: QpConfig,

    ctx: Arc<dyn DeviceContext>,
    ring: Arc<dyn Ring>,
    pool: Arc<dyn BufferPool>,
    events: Arc<dyn EventHandler>,
    port_num: PortNum,
    lag_tx_port_affinity: PortNum,
    rx_comp_channel: Option<RawFd>,

    qp: Option<Qp>,
    cq_tx: Option<Box<dyn CompletionQueue>>,
    cq_rx: Option<Box<dyn CompletionQueue>>,

    /// Capabilities in use. Requested values until configured.
    caps: QpCaps,
    rx_num_wr: u32,
    tx_num_wr: u32,

    rx_batch: RecvBatch,
    prev_rx_desc: Option<BufId>,
    last_posted_rx: Option<WrId>,

    signals: UnsignaledSendCounter,
    rate_limit: RateLimit,
}

impl<T: QpTransport + Default> QpMgr<T> {
    /// Create an unconfigured manager for a send queue of `tx_num_wr` work
    /// requests.
    pub fn new(desc: QpMgrDesc, tx_num_wr: u32, config: QpConfig) -> Self {
        Self::with_transport(desc, tx_num_wr, config, T::default())
    }
}

impl<T: QpTransport> QpMgr<T> {
    /// Create an unconfigured manager with the given transport.
    pub fn with_transport(desc: QpMgrDesc, tx_num_wr: u32, config: QpConfig, transport: T) -> Self {
        let caps = QpCaps {
            max_send_wr: tx_num_wr,
            max_recv_wr: config.rx_num_wr,
            max_send_sge: if desc.ring.is_tso() {
                desc.ctx.attr().max_sge
            } else {
                config.tx_num_sge
            },
            max_recv_sge: if desc.ring.is_socketxtreme() {
                1
            } else {
                config.rx_num_sge
            },
            max_inline_data: config.tx_max_inline,
        };

        Self {
            transport,
            rx_batch: RecvBatch::new(config.rx_num_wr_to_post_recv.max(1) as usize),
            signals: UnsignaledSendCounter::new(config.tx_unsignaled_threshold()),
            rx_num_wr: config.rx_num_wr,
            tx_num_wr,
            config,

            ctx: desc.ctx,
            ring: desc.ring,
            pool: desc.pool,
            events: desc.events,
            port_num: desc.port_num,
            lag_tx_port_affinity: desc.lag_tx_port_affinity,
            rx_comp_channel: desc.rx_comp_channel,

            qp: None,
            cq_tx: None,
            cq_rx: None,
            caps,
            prev_rx_desc: None,
            last_posted_rx: None,
            rate_limit: RateLimit::default(),
        }
    }

    /// Create the completion queue of one direction, retrying once with a
    /// smaller size for mlx4 devices under Hyper-V, whose upstream driver
    /// fails large CQ allocations.
    fn init_cq(
        &mut self,
        channel: Option<RawFd>,
        dir: CqDirection,
    ) -> Result<Box<dyn CompletionQueue>, QpError> {
        let num_wr = match dir {
            CqDirection::Tx => self.tx_num_wr,
            CqDirection::Rx => self.rx_num_wr,
        };
        let err = match self.ring.create_cq(&self.ctx, num_wr, channel, dir) {
            Ok(cq) => return Ok(cq),
            Err(e) => e,
        };

        if self.config.hypervisor == Hypervisor::Mshv
            && self.ctx.model() == DeviceModel::Mlx4
            && num_wr > MAX_UPSTREAM_CQ_MSHV_SIZE
        {
            log::debug!(
                "qpm: cq creation failed with cq_size of {}. retrying with size of {}",
                num_wr,
                MAX_UPSTREAM_CQ_MSHV_SIZE
            );
            match dir {
                CqDirection::Tx => self.tx_num_wr = MAX_UPSTREAM_CQ_MSHV_SIZE,
                CqDirection::Rx => self.rx_num_wr = MAX_UPSTREAM_CQ_MSHV_SIZE,
            }
            if let Ok(cq) =
                self.ring
                    .create_cq(&self.ctx, MAX_UPSTREAM_CQ_MSHV_SIZE, channel, dir)
            {
                return Ok(cq);
            }
        }

        log::error!("qpm: failed allocating {} CQ: {}", dir, err);
        Err(QpError::CqCreation { dir, source: err })
    }

    /// Negotiate capabilities and create the completion queues and the
    /// queue pair.
    pub fn configure(&mut self) -> Result<(), QpError> {
        log::debug!(
            "qpm: creating QP of transport type '{}' on device '{}' on port {}",
            self.ring.transport_type(),
            self.ctx.name(),
            self.port_num
        );

        let max_qp_wr = max_rx_wr_for_device(self.ctx.attr().max_qp_wr);
        if self.rx_num_wr > max_qp_wr {
            log::warn!(
                "qpm: allocating only {} Rx QP work requests while user requested rx_num_wr={} for QP on <{}, {}>",
                max_qp_wr,
                self.rx_num_wr,
                self.ctx.name(),
                self.port_num
            );
            self.rx_num_wr = max_qp_wr;
        }

        let cq_tx = self.init_cq(self.ring.tx_comp_channel(), CqDirection::Tx)?;
        let cq_rx = self.init_cq(self.rx_comp_channel, CqDirection::Rx)?;

        // Completion events are consumed by polling loops.
        for cq in [&cq_rx, &cq_tx] {
            if let Some(fd) = cq.channel_fd() {
                if let Err(e) = set_block_mode(fd, false) {
                    log::warn!("qpm: cannot make CQ channel {} non-blocking: {}", fd, e);
                }
            }
        }
        let send_cq = cq_tx.handle();
        let recv_cq = cq_rx.handle();
        self.cq_tx = Some(cq_tx);
        self.cq_rx = Some(cq_rx);

        let mut caps = QpCaps {
            max_send_wr: self.tx_num_wr,
            max_recv_wr: self.rx_num_wr,
            ..self.caps
        };
        let tso_header = self
            .ring
            .is_tso()
            .then(|| self.ring.max_tso_header_size());
        caps.cap_by_wqebb_budget(tso_header);
        log::debug!("qpm: requested QP parameters: {}", caps);

        let qp = self.transport.prepare_qp(QpSetup {
            ctx: &self.ctx,
            ring: self.ring.as_ref(),
            port: self.port_num,
            send_cq,
            recv_cq,
            caps,
        })?;
        log::debug!("qpm: configured QP parameters: {}", caps);

        let actual = qp.query_caps()?;
        self.caps = caps.clamp_to(&actual);
        log::debug!("qpm: used QP (num={}) {}", qp.qp_num(), self.caps);
        self.qp = Some(qp);

        if self.lag_tx_port_affinity > 0 {
            if let Err(e) = self.pin_lag_port(self.lag_tx_port_affinity) {
                log::debug!(
                    "qpm: cannot pin QP to LAG port {}: {}",
                    self.lag_tx_port_affinity,
                    e
                );
            }
        }

        self.rx_batch.prelink();
        self.prev_rx_desc = None;
        Ok(())
    }

    /// Pin transmit traffic to a port of the device's link aggregation
    /// group. Return the configured and active ports.
    ///
    /// Pinning is advisory: callers may ignore failures, and traffic keeps
    /// flowing on the port the device chooses.
    pub fn pin_lag_port(&self, port: PortNum) -> io::Result<(PortNum, PortNum)> {
        let qp = self
            .qp
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "QP is not configured"))?;
        let num_lag_ports = self.ctx.num_lag_ports()?;
        log::debug!("qpm: QP LAG port: {} of {}", port, num_lag_ports);

        self.ctx.modify_qp_lag_port(qp.handle(), port)?;
        let (current, active) = self.ctx.query_qp_lag_port(qp.handle())?;
        log::debug!("qpm: QP LAG port affinity: {} => {}", current, active);
        Ok((current, active))
    }

    /// Bring the queue pair up: register with the send completion queue,
    /// drop stale completions, move to RTS, then register with the receive
    /// completion queue.
    pub fn up(&mut self, shutdown: &ShutdownSignal) -> Result<(), QpError> {
        let qp = self.qp.as_ref().ok_or(QpError::NotConfigured)?;
        let qpn = qp.qp_num();
        log::debug!("qpm: QP current state: {}", qp.state());

        if let Some(cq) = self.cq_tx.as_mut() {
            cq.add_qp_tx(qpn);
        }

        // Flushed completions of a previous incarnation may still be queued.
        self.release_rx_buffers(shutdown);
        self.release_tx_buffers();

        let qp = self.qp.as_ref().ok_or(QpError::NotConfigured)?;
        self.transport.modify_to_ready(qp)?;

        if let Some(cq) = self.cq_rx.as_mut() {
            cq.add_qp_rx(qpn);
        }
        Ok(())
    }

    /// Take the queue pair down: move to ERR, force a final send completion,
    /// drain both completion queues, and deregister from them.
    ///
    /// Resources that were never created are skipped.
    pub fn down(&mut self, shutdown: &ShutdownSignal) {
        let qpn = self.qp.as_ref().map(|qp| {
            log::debug!("qpm: QP current state: {}", qp.state());
            if let Err(e) = qp.modify(QpTransition::ToError) {
                log::debug!("qpm: ibv_modify_qp failure: {}", e);
            }
            qp.qp_num()
        });

        self.trigger_completion_for_all_sent_packets();

        // Let the hardware turn outstanding work into flushed completions.
        thread::sleep(Duration::from_micros(self.config.down_settle_us));

        self.release_tx_buffers();
        self.release_rx_buffers(shutdown);

        if let Some(qpn) = qpn {
            if let Some(cq) = self.cq_tx.as_mut() {
                cq.del_qp_tx(qpn);
            }
            if let Some(cq) = self.cq_rx.as_mut() {
                cq.del_qp_rx(qpn);
            }
        }
    }

    /// Post one signaled send if the last send was unsignaled, so that a
    /// completion covers every send before it.
    ///
    /// The QP is expected to be in ERR, so nothing reaches the wire.
    pub fn trigger_completion_for_all_sent_packets(&mut self) {
        log::debug!("qpm: unsignaled count={}", self.signals.unsignaled());
        if self.signals.is_last_signaled() {
            return;
        }

        log::debug!("qpm: need to send closing tx wr");
        let buf = self.ring.acquire_tx_buffer(DUMMY_FRAME_LEN, true);
        // This buffer bypasses the regular send accounting.
        self.ring.adjust_missing_buf_refs(-1);

        let Some(buf) = buf else {
            log::error!("qpm: no buffer in pool");
            return;
        };
        if buf.len < DUMMY_FRAME_LEN {
            log::error!(
                "qpm: tx buffer {} too small for closing wr ({} < {})",
                buf.id,
                buf.len,
                DUMMY_FRAME_LEN
            );
            self.give_back_tx_buffer(buf);
            return;
        }

        // SAFETY: the buffer was just acquired, so it is exclusively ours and
        // spans at least `DUMMY_FRAME_LEN` bytes.
        let frame = unsafe { buf.as_mut_slice() };
        write_dummy_frame(&mut frame[..DUMMY_FRAME_LEN as usize]);

        let mut wr = SendWr::new(buf.id.wr_id()).sge(Sge {
            addr: buf.addr,
            length: DUMMY_FRAME_LEN,
            lkey: self.ring.tx_lkey(),
        });
        log::debug!("qpm: IBV_SEND_SIGNALED");
        let attr = TxPacketAttr::L3_CSUM | TxPacketAttr::L4_CSUM;
        match self.send_to_wire(&mut wr, attr, true) {
            Ok(()) => self.signals.record(true),
            Err(_) => self.give_back_tx_buffer(buf),
        }
    }

    /// Return a closing-send buffer that never reached the send queue, and
    /// take back the accounting adjustment made when it was acquired.
    fn give_back_tx_buffer(&self, buf: BufferDesc) {
        self.ring.adjust_missing_buf_refs(1);
        self.ring.return_tx_buffer(buf);
    }

    /// Post one send. If `request_comp` is set, the send requests a
    /// completion; the flag is cleared from `wr` afterwards in either case.
    pub fn send_to_wire(
        &self,
        wr: &mut SendWr,
        attr: TxPacketAttr,
        request_comp: bool,
    ) -> Result<(), QpError> {
        let qp = self.qp.as_ref().ok_or(QpError::NotConfigured)?;

        let flags = wr.flags;
        if request_comp {
            wr.flags |= SendFlags::SIGNALED;
        }
        if !attr.is_empty() {
            wr.flags |= SendFlags::IP_CSUM;
        }
        let ret = self.ctx.post_send(qp.handle(), wr);
        let posted_flags = wr.flags;
        wr.flags = flags.difference(SendFlags::SIGNALED);

        ret.map_err(|e| {
            log::error!(
                "qpm: failed post_send{}: {}",
                if posted_flags.contains(SendFlags::INLINE) {
                    "(+inline)"
                } else {
                    ""
                },
                e
            );
            if let Some(why) = explain_post_error(&e) {
                log::error!("qpm: {}", why);
            }
            if let Some(sge) = wr.sgl.first() {
                log::error!(
                    "qpm: bad_wr info: wr_id={:#x}, send_flags={:?}, addr={:#x}, length={}, lkey={:#x}, max_inline_data={}",
                    wr.wr_id,
                    posted_flags,
                    sge.addr,
                    sge.length,
                    sge.lkey,
                    self.caps.max_inline_data
                );
            }
            QpError::PostSend(e)
        })
    }

    /// Send a packet, requesting a completion as the signaling policy
    /// dictates. Zero-copy sends always request one. When a completion was
    /// requested, the send completion queue is polled once right away.
    pub fn send(&mut self, wr: &mut SendWr, attr: TxPacketAttr) -> Result<(), QpError> {
        let signal = self.signals.should_signal(wr.zero_copy);
        log::trace!(
            "qpm: send, unsignaled_count: {}",
            self.signals.unsignaled()
        );

        self.send_to_wire(wr, attr, signal)?;
        self.signals.record(signal);

        if signal {
            if let Some(cq) = self.cq_tx.as_mut() {
                let mut poll_sn = 0;
                match cq.poll_and_process_tx(&mut poll_sn) {
                    Ok(n) => log::trace!("qpm: polled tx cq ({} wce)", n),
                    Err(e) => log::error!("qpm: error polling tx cq: {}", e),
                }
            }
        }
        Ok(())
    }

    /// Hand a receive buffer to the queue pair.
    ///
    /// Buffers are collected into a batch that is posted as one chain when
    /// full. A rejected post is unrecoverable; the chain is repaired before
    /// the error is returned.
    pub fn post_recv_buffer(&mut self, desc: BufferDesc) -> Result<(), QpError> {
        let handle = self.qp.as_ref().ok_or(QpError::NotConfigured)?.handle();

        if self.config.rx_prefetch_bytes_before_poll > 0 {
            if let Some(prev) = self.prev_rx_desc {
                self.pool.link_prefetch(prev, Some(desc.id));
            }
            self.prev_rx_desc = Some(desc.id);
        }

        if !self.rx_batch.push(desc) {
            return Ok(());
        }

        self.last_posted_rx = Some(desc.id.wr_id());
        if self.config.rx_prefetch_bytes_before_poll > 0 {
            self.pool.link_prefetch(desc.id, None);
        }
        self.prev_rx_desc = None;

        match self.ctx.post_recv(handle, self.rx_batch.chain_mut()) {
            Ok(()) => {
                log::trace!("qpm: successful post_recv");
                Ok(())
            }
            Err(PostRecvError { bad_index, source }) => {
                log::error!("qpm: failed posting list: {}", source);
                if let Some(why) = explain_post_error(&source) {
                    log::error!("qpm: {}", why);
                }
                log::error!(
                    "qpm: bad_wr is {} in submitted list (size={})",
                    bad_index,
                    self.rx_batch.capacity()
                );
                if let Some(wr) = self.rx_batch.chain().get(bad_index) {
                    log::error!(
                        "qpm: bad_wr info: wr_id={:#x}, next={:?}, addr={:#x}, length={}, lkey={:#x}",
                        wr.wr_id,
                        wr.next,
                        wr.sge.addr,
                        wr.sge.length,
                        wr.sge.lkey
                    );
                }
                if let Some(qp) = self.qp.as_ref() {
                    log::error!("qpm: QP current state: {}", qp.state());
                }

                // Only the head of the chain reached the hardware.
                self.last_posted_rx = bad_index
                    .checked_sub(1)
                    .and_then(|i| self.rx_batch.chain().get(i))
                    .map(|wr| wr.wr_id);
                self.rx_batch.repair(bad_index);
                self.rx_batch.reclaim_from(bad_index);
                Err(QpError::PostRecv { bad_index, source })
            }
        }
    }

    /// Post `count` buffers taken from the front of `bufs`.
    ///
    /// The queue is shared with the receive completion queue, so the caller
    /// must hold the lock that completion queue takes to reclaim
    /// descriptors.
    pub fn post_recv_buffers(&mut self, bufs: &mut DescQueue, count: usize) -> Result<(), QpError> {
        if self.qp.is_none() {
            return Err(QpError::NotConfigured);
        }
        log::debug!("qpm: posting {} recv buffers", count);
        for _ in 0..count {
            let Some(desc) = bufs.pop_front() else {
                break;
            };
            self.post_recv_buffer(desc)?;
        }
        Ok(())
    }

    /// Give descriptors that never reached the hardware back to their
    /// owners.
    fn return_unposted(&self, descs: Vec<BufferDesc>) {
        let (owned, global): (Vec<_>, Vec<_>) = descs.into_iter().partition(|d| d.owned_by_ring);
        for desc in owned {
            self.ring.return_buffer_to_owner_rx(desc);
        }
        if !global.is_empty() {
            self.pool.put_buffers_thread_safe(global);
        }
    }

    /// Return unposted receive buffers and drain flushed receive
    /// completions. Return the number of buffers handled.
    ///
    /// Draining stops once the last posted buffer has completed, the device
    /// is removed, the receive queue is empty, a completion pass reports
    /// `EIO`, or `shutdown` is triggered. The last posted marker is cleared
    /// in every case.
    pub fn release_rx_buffers(&mut self, shutdown: &ShutdownSignal) -> usize {
        let unposted = self.rx_batch.drain_unposted();
        let mut total = unposted.len();
        if !unposted.is_empty() {
            log::debug!("qpm: returning {} pending post_recv buffers to owner", total);
            self.return_unposted(unposted);
        }
        self.prev_rx_desc = None;

        log::debug!(
            "qpm: draining rx cq (last_posted_rx_wr_id = {:?})",
            self.last_posted_rx
        );
        let rq_empty = |this: &Self| {
            this.qp
                .as_ref()
                .map_or(true, |qp| this.ctx.rq_is_empty(qp.handle()))
        };

        let mut last_polled = None;
        let mut spin = SpinWarner::new("rx drain");
        while self.cq_rx.is_some()
            && last_polled != self.last_posted_rx
            && !self.ctx.is_removed()
            && !rq_empty(self)
            && !shutdown.is_triggered()
        {
            let Some(cq) = self.cq_rx.as_mut() else {
                break;
            };
            let processed = match cq.drain_and_process_rx(&mut last_polled) {
                Ok(n) => n,
                Err(e) if is_device_io_error(&e) => {
                    log::debug!("qpm: rx cq drain stopped: {}", e);
                    break;
                }
                Err(e) => {
                    log::warn!("qpm: rx cq drain failed: {}", e);
                    0
                }
            };
            log::debug!(
                "qpm: draining completed on rx cq ({} wce) last_polled_rx_wr_id = {:?}",
                processed,
                last_polled
            );
            total += processed;

            if processed == 0 {
                // Look for a fatal device event behind the stall.
                self.events.query_for_ibverbs_event(self.ctx.async_fd());
            }

            spin.tick();
            thread::sleep(Duration::from_micros(self.config.rx_drain_interval_us));
        }

        // The receive queue is considered cleared whatever stopped the drain.
        self.last_posted_rx = None;
        log::debug!("qpm: draining completed with a total of {} wce's on rx cq", total);
        total
    }

    /// Poll send completions until a pass yields nothing, the device is
    /// removed, or a pass reports `EIO`. Return the number of completions
    /// processed.
    pub fn release_tx_buffers(&mut self) -> usize {
        if self.qp.is_none() {
            return 0;
        }
        let Some(cq) = self.cq_tx.as_mut() else {
            return 0;
        };

        log::debug!("qpm: draining tx cq");
        let mut poll_sn = 0;
        let mut total = 0;
        let mut spin = SpinWarner::new("tx drain");
        loop {
            match cq.poll_and_process_tx(&mut poll_sn) {
                Ok(0) => break,
                Ok(n) => {
                    log::debug!("qpm: draining completed on tx cq ({} wce)", n);
                    total += n;
                }
                Err(e) => {
                    if !is_device_io_error(&e) {
                        log::warn!("qpm: tx cq drain failed: {}", e);
                    }
                    break;
                }
            }
            if self.ctx.is_removed() {
                break;
            }
            spin.tick();
        }
        total
    }

    /// Determine which fields of `rate_limit` differ from the applied
    /// packet pacing configuration.
    #[inline]
    pub fn is_ratelimit_change(&self, rate_limit: &RateLimit) -> RateLimitChanges {
        self.rate_limit.diff(rate_limit)
    }

    /// Apply a packet pacing configuration. The stored configuration is
    /// replaced only if the device accepts it.
    pub fn modify_ratelimit(
        &mut self,
        rate_limit: &RateLimit,
        changes: RateLimitChanges,
    ) -> Result<(), QpError> {
        let qp = self.qp.as_ref().ok_or(QpError::NotConfigured)?;
        self.ctx
            .modify_rate_limit(qp.handle(), rate_limit, changes)
            .map_err(|e| {
                log::debug!("qpm: failed to modify qp ratelimit: {}", e);
                QpError::RateLimit(e)
            })?;
        self.rate_limit = *rate_limit;
        Ok(())
    }

    /// Create a flow steering rule that directs matching packets to this
    /// queue pair.
    ///
    /// Rules that target an offload object are not supported; `None` then
    /// tells the caller to classify in software. `None` is also returned if
    /// the device rejects the rule.
    pub fn create_flow_rule(
        &self,
        attr: &FlowAttr,
        offload: Option<&OffloadContext>,
    ) -> Option<FlowRule> {
        if let Some(offload) = offload {
            log::warn!(
                "qpm: requested steering rule to TIR {} cannot be created; offloaded receive objects are not supported",
                offload.tir_num
            );
            return None;
        }

        let qp = self.qp.as_ref()?;
        match self.ctx.create_flow(qp.handle(), attr) {
            Ok(handle) => Some(FlowRule::new(self.ctx.clone(), handle)),
            Err(e) => {
                log::debug!("qpm: failed to create flow rule: {}", e);
                None
            }
        }
    }

    /// Get the queue pair, if configured.
    #[inline]
    pub fn qp(&self) -> Option<&Qp> {
        self.qp.as_ref()
    }

    /// Get the queue pair number, if configured.
    #[inline]
    pub fn qpn(&self) -> Option<Qpn> {
        self.qp.as_ref().map(Qp::qp_num)
    }

    /// Query the queue pair state, if configured.
    #[inline]
    pub fn state(&self) -> Option<QpState> {
        self.qp.as_ref().map(Qp::state)
    }

    /// Get the capabilities in use.
    #[inline]
    pub fn caps(&self) -> QpCaps {
        self.caps
    }

    /// Get the number of receive work requests the queue pair was sized
    /// for.
    #[inline]
    pub fn rx_max_wr_num(&self) -> u32 {
        self.rx_num_wr
    }

    /// Get the number of send work requests the send CQ was sized for.
    #[inline]
    pub fn tx_num_wr(&self) -> u32 {
        self.tx_num_wr
    }

    /// Get the physical port number.
    #[inline]
    pub fn port_num(&self) -> PortNum {
        self.port_num
    }

    /// Get the work request identifier of the last posted receive buffer.
    #[inline]
    pub fn last_posted_rx_wr_id(&self) -> Option<WrId> {
        self.last_posted_rx
    }

    /// Get the applied packet pacing configuration.
    #[inline]
    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
    }

    /// Get the number of sends posted unsignaled since the last signaled
    /// one.
    #[inline]
    pub fn unsignaled_count(&self) -> u32 {
        self.signals.unsignaled()
    }
}

impl<T: QpTransport> Drop for QpMgr<T> {
    fn drop(&mut self) {
        // The QP must go before the CQs it is attached to.
        self.qp = None;
        self.cq_tx = None;
        self.cq_rx = None;
        log::debug!(
            "qpm: Rx buffer pool: {} free global buffers available",
            self.pool.free_count()
        );
    }
}

/// Fill `frame` with a zeroed Ethernet header of EtherType IPv4 followed by
/// a zeroed IPv4 header. Providers drop frames with only an Ethernet header.
fn write_dummy_frame(frame: &mut [u8]) {
    frame.fill(0);
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
}
