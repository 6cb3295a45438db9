use crate::report::StatusReport;
use crate::status::CanonicalStatus::{self, *};

/// Full aggregation: derive the execution status from a tally of every step.
///
/// Precedence, first match wins:
/// Blocked > Failure > only Untestable > only Settled/Untestable >
/// only Success/Untestable/Settled > any Success/Settled (Running) > Ready.
pub fn aggregate(report: &StatusReport) -> CanonicalStatus {
    if report.has(Blocked) {
        Blocked
    } else if report.has(Failure) {
        Failure
    } else if report.all_of(&[Untestable]) {
        Untestable
    } else if report.all_of(&[Settled, Untestable]) {
        Settled
    } else if report.all_of(&[Success, Untestable, Settled]) {
        Success
    } else if report.any_of(&[Success, Settled]) {
        Running
    } else {
        Ready
    }
}
