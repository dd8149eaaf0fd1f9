use std::sync::Arc;

use super::*;
use crate::rdma::ring::Ring;
use crate::rdma::verbs::CqHandle;

/// Everything a transport needs to create the hardware queue pair of a
/// manager.
pub struct QpSetup<'a> {
    /// Device to create the QP on.
    pub ctx: &'a Arc<dyn DeviceContext>,

    /// The ring the QP serves.
    pub ring: &'a dyn Ring,

    /// Physical port to bind to.
    pub port: PortNum,

    /// Send completion queue.
    pub send_cq: CqHandle,

    /// Receive completion queue.
    pub recv_cq: CqHandle,

    /// Negotiated capabilities.
    pub caps: QpCaps,
}

/// Transport-specific part of queue pair management: how the queue pair is
/// created and how it is brought to the ready state.
pub trait QpTransport {
    /// Create the queue pair and move it to INIT.
    fn prepare_qp(&self, setup: QpSetup<'_>) -> Result<Qp, QpError>;

    /// Move the queue pair to RTS.
    ///
    /// Must be idempotent: a QP that is already past INIT is not taken back
    /// to INIT, and a QP in RTS is left alone.
    fn modify_to_ready(&self, qp: &Qp) -> Result<(), QpError>;
}

/// Raw Ethernet transport. Queue pairs are [`QpType::RawPacket`] and need
/// no address handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthQpTransport;

/// Queue pair manager of a raw Ethernet ring.
pub type EthQpMgr = QpMgr<EthQpTransport>;

impl QpTransport for EthQpTransport {
    fn prepare_qp(&self, setup: QpSetup<'_>) -> Result<Qp, QpError> {
        let max_tso_header = setup
            .ring
            .is_tso()
            .then(|| setup.ring.max_tso_header_size());
        if let Some(hdr) = max_tso_header {
            log::debug!("qpm: create qp with max_tso_header = {}", hdr);
        }

        let init_attr = QpInitAttr {
            send_cq: setup.send_cq,
            recv_cq: setup.recv_cq,
            caps: setup.caps,
            qp_type: QpType::RawPacket,
            sq_sig_all: false,
            max_tso_header,
        };
        let qp = Qp::create(setup.ctx, &init_attr, setup.port)?;

        qp.modify(QpTransition::ToInit { port: setup.port })
            .map_err(|e| {
                log::error!("qpm: {}", e);
                e
            })?;
        Ok(qp)
    }

    fn modify_to_ready(&self, qp: &Qp) -> Result<(), QpError> {
        let state = qp.state();
        log::debug!("qpm: moving {} from {} to RTS", qp.handle(), state);

        let ret = (|| {
            if state == QpState::Rts {
                return Ok(());
            }
            if state != QpState::Init && !state.is_past_init() {
                qp.modify(QpTransition::ToInit { port: qp.port() })?;
            }
            if !state.is_past_init() {
                qp.modify(QpTransition::ToRtr)?;
            }
            qp.modify(QpTransition::ToRts)
        })();

        if let Err(ref e) = ret {
            log::error!("qpm: {}", e);
        }
        ret
    }
}
