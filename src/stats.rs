//! 전송 통계

use std::time::{Duration, Instant};

/// 단일 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 송신한 블록 수 (재전송 제외)
    pub blocks_sent: u64,

    /// 타임아웃으로 인한 재전송 수
    pub retransmits: u64,

    /// 송신한 페이로드 바이트 (재전송 제외)
    pub bytes_sent: u64,

    /// 버려진 데이터그램 수 (디코딩 실패, 블록 번호 불일치)
    pub stray_datagrams: u64,

    /// 전송 시작 시간
    pub started_at: Instant,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            blocks_sent: 0,
            retransmits: 0,
            bytes_sent: 0,
            stray_datagrams: 0,
            started_at: Instant::now(),
        }
    }

    /// 확인된 블록 기록
    pub fn record_block(&mut self, payload_len: usize) {
        self.blocks_sent += 1;
        self.bytes_sent += payload_len as u64;
    }

    pub fn record_retransmit(&mut self) {
        self.retransmits += 1;
    }

    pub fn record_stray(&mut self) {
        self.stray_datagrams += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 바이트 처리율 계산 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed();
        if elapsed.is_zero() {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed.as_secs_f64()
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 서버 전체 통계
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// 수락된 읽기 요청 수
    pub accepted: u64,

    /// 정상 완료된 전송 수
    pub completed: u64,

    /// 수락 전에 거절된 요청 수 (잘못된 RRQ, 동시 전송 한도)
    pub refused: u64,

    /// 수락 후 ERROR 응답으로 거부된 전송 수 (모드, 경로, 파일 열기)
    pub rejected: u64,

    /// ACK 재시도 소진으로 중단된 전송 수
    pub timed_out: u64,

    /// 전송 계층 장애로 포기한 전송 수
    pub failed: u64,

    /// 완료된 전송의 총 바이트
    pub bytes_served: u64,
}

impl ServerStats {
    /// 종료된 전송 수 (수락된 요청만 해당)
    pub fn finished(&self) -> u64 {
        self.completed + self.rejected + self.timed_out + self.failed
    }

    /// 아직 진행 중인 전송 수
    pub fn in_flight(&self) -> u64 {
        self.accepted.saturating_sub(self.finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_stats_counters() {
        let mut stats = TransferStats::new();
        stats.record_block(512);
        stats.record_block(100);
        stats.record_retransmit();
        stats.record_stray();
        stats.record_stray();

        assert_eq!(stats.blocks_sent, 2);
        assert_eq!(stats.bytes_sent, 612);
        assert_eq!(stats.retransmits, 1);
        assert_eq!(stats.stray_datagrams, 2);
        assert!(stats.throughput() >= 0.0);
    }

    #[test]
    fn test_server_stats_finished() {
        let stats = ServerStats {
            accepted: 6,
            refused: 3,
            completed: 2,
            rejected: 1,
            timed_out: 1,
            failed: 1,
            bytes_served: 1024,
        };
        assert_eq!(stats.finished(), 5);
        assert_eq!(stats.in_flight(), 1);
        assert_eq!(stats.accepted, stats.finished() + stats.in_flight());
    }
}
