use csmc_core::derive_substream_seed;

const REPLICATE_SALT: u64 = 0x5EED_C0DE_0000_0001;
const RESAMPLE_SALT: u64 = 0xA5A5_A5A5_A5A5_A5A5;
const ROOT_BRANCH_SALT: u64 = 0x0B7A_4C4E_5EED_0002;

/// Seed of the random stream a particle receives at creation.
pub fn particle_seed(master_seed: u64, particle_index: usize) -> u64 {
    derive_substream_seed(master_seed, particle_index as u64)
}

/// Seed of the fresh stream given to the replicate placed in `slot` during `iteration`.
pub fn replicate_seed(master_seed: u64, iteration: usize, slot: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed ^ REPLICATE_SALT, iteration as u64);
    derive_substream_seed(intermediate, slot as u64)
}

/// Seed of the ancestor draws made while resampling before `iteration`.
pub fn resample_seed(master_seed: u64, iteration: usize) -> u64 {
    derive_substream_seed(master_seed ^ RESAMPLE_SALT, iteration as u64)
}

/// Seed of the root-branch draws made once every particle is complete.
pub fn root_branch_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ ROOT_BRANCH_SALT, 0)
}
