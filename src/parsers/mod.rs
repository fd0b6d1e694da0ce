/*
 * Decoders for data served by DHT peers.
 */

pub mod info_payload;
