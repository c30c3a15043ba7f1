/*
 * Scheduling Policies Module
 *
 * Each policy implements SchedExtOps and is handed to the host as
 * Box<dyn SchedExtOps> at attach time.
 *
 * Available policies:
 * - EscalatorPolicy: Global queue drained only by CPU 0
 */

pub mod escalator;

pub use escalator::EscalatorPolicy;
