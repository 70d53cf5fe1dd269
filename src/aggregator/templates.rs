//! Bundled Move templates used to seed the local store
//!
//! Optional capabilities live in functions named after their feature tag so
//! the customizer can comment them out by tag.

use super::models::ContractCandidate;
use crate::intent::ContractCategory;

const NFT_COLLECTION: &str = r#"module forge::nft_collection {
    use std::signer;
    use std::string::String;
    use aptos_framework::event;

    const E_NOT_CREATOR: u64 = 1;
    const E_SUPPLY_EXHAUSTED: u64 = 2;

    struct Collection has key {
        name: String,
        max_supply: u64,
        minted: u64,
        royalty_bps: u64,
    }

    #[event]
    struct Minted has drop, store {
        receiver: address,
        serial: u64,
    }

    public entry fun create_collection(creator: &signer, name: String, max_supply: u64) {
        move_to(creator, Collection { name, max_supply, minted: 0, royalty_bps: 0 });
    }

    public entry fun minting(creator: &signer, receiver: address) acquires Collection {
        let collection = borrow_global_mut<Collection>(signer::address_of(creator));
        assert!(collection.minted < collection.max_supply, E_SUPPLY_EXHAUSTED);
        collection.minted = collection.minted + 1;
        event::emit(Minted { receiver, serial: collection.minted });
    }

    public entry fun royalties(creator: &signer, royalty_bps: u64) acquires Collection {
        let collection = borrow_global_mut<Collection>(signer::address_of(creator));
        collection.royalty_bps = royalty_bps;
    }

    #[view]
    public fun minted(creator: address): u64 acquires Collection {
        borrow_global<Collection>(creator).minted
    }
}
"#;

const FUNGIBLE_TOKEN: &str = r#"module forge::fungible_token {
    use std::signer;
    use aptos_framework::coin;

    const E_NOT_ADMIN: u64 = 1;

    struct ForgeCoin {}

    struct Caps has key {
        mint: coin::MintCapability<ForgeCoin>,
        burn: coin::BurnCapability<ForgeCoin>,
        freeze: coin::FreezeCapability<ForgeCoin>,
    }

    public entry fun initialize(admin: &signer, decimals: u8) {
        let (burn, freeze, mint) = coin::initialize<ForgeCoin>(
            admin,
            std::string::utf8(b"Forge Coin"),
            std::string::utf8(b"FRG"),
            decimals,
            true,
        );
        move_to(admin, Caps { mint, burn, freeze });
    }

    public entry fun minting(admin: &signer, to: address, amount: u64) acquires Caps {
        let caps = borrow_global<Caps>(signer::address_of(admin));
        coin::deposit(to, coin::mint(amount, &caps.mint));
    }

    public entry fun burning(admin: &signer, amount: u64) acquires Caps {
        let caps = borrow_global<Caps>(signer::address_of(admin));
        coin::burn(coin::withdraw<ForgeCoin>(admin, amount), &caps.burn);
    }

    public entry fun transfers(from: &signer, to: address, amount: u64) {
        coin::transfer<ForgeCoin>(from, to, amount);
    }
}
"#;

const NFT_MARKETPLACE: &str = r#"module forge::nft_marketplace {
    use std::signer;
    use aptos_framework::coin;
    use aptos_framework::aptos_coin::AptosCoin;
    use aptos_std::table::{Self, Table};

    const E_NOT_LISTED: u64 = 1;
    const E_NOT_SELLER: u64 = 2;

    struct Listing has store, drop {
        seller: address,
        price: u64,
    }

    struct Market has key {
        listings: Table<u64, Listing>,
        fee_bps: u64,
    }

    public entry fun open_market(admin: &signer, fee_bps: u64) {
        move_to(admin, Market { listings: table::new(), fee_bps });
    }

    public entry fun listing(seller: &signer, market: address, item: u64, price: u64) acquires Market {
        let market = borrow_global_mut<Market>(market);
        table::add(&mut market.listings, item, Listing { seller: signer::address_of(seller), price });
    }

    public entry fun buy(buyer: &signer, market: address, item: u64) acquires Market {
        let market = borrow_global_mut<Market>(market);
        assert!(table::contains(&market.listings, item), E_NOT_LISTED);
        let Listing { seller, price } = table::remove(&mut market.listings, item);
        coin::transfer<AptosCoin>(buyer, seller, price);
    }

    public entry fun auction(seller: &signer, market: address, item: u64, reserve: u64) acquires Market {
        listing(seller, market, item, reserve);
    }
}
"#;

const STAKING_VAULT: &str = r#"module forge::staking_vault {
    use std::signer;
    use aptos_framework::coin;
    use aptos_framework::aptos_coin::AptosCoin;
    use aptos_framework::timestamp;

    const E_NO_STAKE: u64 = 1;
    const E_LOCKED: u64 = 2;

    struct Stake has key {
        amount: u64,
        since: u64,
    }

    public entry fun staking(user: &signer, amount: u64) {
        coin::transfer<AptosCoin>(user, @forge, amount);
        move_to(user, Stake { amount, since: timestamp::now_seconds() });
    }

    public entry fun unstake(user: &signer) acquires Stake {
        let addr = signer::address_of(user);
        assert!(exists<Stake>(addr), E_NO_STAKE);
        let Stake { amount: _, since: _ } = move_from<Stake>(addr);
    }

    #[view]
    public fun yield_farming(user: address, rate_bps: u64): u64 acquires Stake {
        let stake = borrow_global<Stake>(user);
        let elapsed = timestamp::now_seconds() - stake.since;
        stake.amount * rate_bps * elapsed / (10000 * 31536000)
    }
}
"#;

const DAO_VOTING: &str = r#"module forge::dao_voting {
    use std::signer;
    use std::string::String;
    use aptos_std::table::{Self, Table};

    const E_ALREADY_VOTED: u64 = 1;
    const E_NO_PROPOSAL: u64 = 2;

    struct Proposal has store {
        title: String,
        yes: u64,
        no: u64,
    }

    struct Dao has key {
        proposals: Table<u64, Proposal>,
        next_id: u64,
        quorum: u64,
    }

    public entry fun create_dao(admin: &signer, quorum: u64) {
        move_to(admin, Dao { proposals: table::new(), next_id: 0, quorum });
    }

    public entry fun proposals(_proposer: &signer, dao: address, title: String) acquires Dao {
        let dao = borrow_global_mut<Dao>(dao);
        table::add(&mut dao.proposals, dao.next_id, Proposal { title, yes: 0, no: 0 });
        dao.next_id = dao.next_id + 1;
    }

    public entry fun voting(voter: &signer, dao: address, id: u64, approve: bool) acquires Dao {
        let _ = signer::address_of(voter);
        let dao = borrow_global_mut<Dao>(dao);
        assert!(table::contains(&dao.proposals, id), E_NO_PROPOSAL);
        let proposal = table::borrow_mut(&mut dao.proposals, id);
        if (approve) { proposal.yes = proposal.yes + 1 } else { proposal.no = proposal.no + 1 };
    }
}
"#;

const GAME_ITEMS: &str = r#"module forge::game_items {
    use std::signer;
    use std::string::String;
    use std::vector;

    const E_NO_INVENTORY: u64 = 1;

    struct Item has store, drop {
        name: String,
        power: u64,
    }

    struct Inventory has key {
        items: vector<Item>,
        points: u64,
    }

    public entry fun register_player(player: &signer) {
        move_to(player, Inventory { items: vector::empty(), points: 0 });
    }

    public entry fun game_items(player: &signer, name: String, power: u64) acquires Inventory {
        let inventory = borrow_global_mut<Inventory>(signer::address_of(player));
        vector::push_back(&mut inventory.items, Item { name, power });
    }

    public entry fun rewards(player: &signer, points: u64) acquires Inventory {
        let inventory = borrow_global_mut<Inventory>(signer::address_of(player));
        inventory.points = inventory.points + points;
    }
}
"#;

const DIGITAL_ASSET: &str = r#"module forge::digital_asset {
    use std::signer;
    use std::string::String;
    use aptos_framework::event;

    const E_NOT_OWNER: u64 = 1;

    struct Asset has key {
        name: String,
        uri: String,
        owner: address,
    }

    #[event]
    struct Transferred has drop, store {
        from: address,
        to: address,
    }

    public entry fun token_creation(creator: &signer, name: String, uri: String) {
        let owner = signer::address_of(creator);
        move_to(creator, Asset { name, uri, owner });
    }

    public entry fun metadata(creator: &signer, uri: String) acquires Asset {
        let asset = borrow_global_mut<Asset>(signer::address_of(creator));
        asset.uri = uri;
    }

    public entry fun transfers(owner: &signer, creator: address, to: address) acquires Asset {
        let asset = borrow_global_mut<Asset>(creator);
        let from = signer::address_of(owner);
        assert!(asset.owner == from, E_NOT_OWNER);
        asset.owner = to;
        event::emit(Transferred { from, to });
    }
}
"#;

const MANAGED_COIN: &str = r#"module forge::managed_coin {
    use std::signer;
    use std::string;
    use aptos_framework::coin;

    const E_NO_CAPABILITIES: u64 = 1;

    struct ManagedCoin {}

    struct Capabilities has key {
        mint_cap: coin::MintCapability<ManagedCoin>,
        burn_cap: coin::BurnCapability<ManagedCoin>,
        freeze_cap: coin::FreezeCapability<ManagedCoin>,
    }

    public entry fun initialize(admin: &signer, decimals: u8) {
        let (burn_cap, freeze_cap, mint_cap) = coin::initialize<ManagedCoin>(
            admin,
            string::utf8(b"Managed Coin"),
            string::utf8(b"MGD"),
            decimals,
            true,
        );
        move_to(admin, Capabilities { mint_cap, burn_cap, freeze_cap });
    }

    public entry fun minting(admin: &signer, to: address, amount: u64) acquires Capabilities {
        let admin_addr = signer::address_of(admin);
        assert!(exists<Capabilities>(admin_addr), E_NO_CAPABILITIES);
        let caps = borrow_global<Capabilities>(admin_addr);
        coin::deposit(to, coin::mint(amount, &caps.mint_cap));
    }

    public entry fun transfers(from: &signer, to: address, amount: u64) {
        coin::transfer<ManagedCoin>(from, to, amount);
    }
}
"#;

const FIXED_PRICE_LISTING: &str = r#"module forge::fixed_price_listing {
    use std::signer;
    use aptos_framework::coin;
    use aptos_framework::aptos_coin::AptosCoin;

    const E_NOT_SELLER: u64 = 1;
    const E_ALREADY_SOLD: u64 = 2;

    struct Listing has key {
        price: u64,
        sold: bool,
    }

    public entry fun listing(seller: &signer, price: u64) {
        move_to(seller, Listing { price, sold: false });
    }

    public entry fun purchase(buyer: &signer, seller: address) acquires Listing {
        let listing = borrow_global_mut<Listing>(seller);
        assert!(!listing.sold, E_ALREADY_SOLD);
        coin::transfer<AptosCoin>(buyer, seller, listing.price);
        listing.sold = true;
    }

    public entry fun cancel(seller: &signer) acquires Listing {
        let Listing { price: _, sold: _ } = move_from<Listing>(signer::address_of(seller));
    }
}
"#;

const TOKEN_SWAP: &str = r#"module forge::token_swap {
    use std::signer;
    use aptos_framework::coin::{Self, Coin};

    const E_ZERO_AMOUNT: u64 = 1;
    const E_INSUFFICIENT_LIQUIDITY: u64 = 2;

    struct Pool<phantom X, phantom Y> has key {
        reserve_x: Coin<X>,
        reserve_y: Coin<Y>,
    }

    public entry fun liquidity_pool<X, Y>(provider: &signer, amount_x: u64, amount_y: u64) {
        assert!(amount_x > 0 && amount_y > 0, E_ZERO_AMOUNT);
        move_to(provider, Pool<X, Y> {
            reserve_x: coin::withdraw<X>(provider, amount_x),
            reserve_y: coin::withdraw<Y>(provider, amount_y),
        });
    }

    public entry fun swap<X, Y>(trader: &signer, pool_addr: address, amount_in: u64) acquires Pool {
        assert!(amount_in > 0, E_ZERO_AMOUNT);
        let pool = borrow_global_mut<Pool<X, Y>>(pool_addr);
        let reserve_x = coin::value(&pool.reserve_x);
        let reserve_y = coin::value(&pool.reserve_y);
        let amount_out = reserve_y * amount_in / (reserve_x + amount_in);
        assert!(amount_out < reserve_y, E_INSUFFICIENT_LIQUIDITY);
        coin::merge(&mut pool.reserve_x, coin::withdraw<X>(trader, amount_in));
        let out = coin::extract(&mut pool.reserve_y, amount_out);
        coin::deposit(signer::address_of(trader), out);
    }
}
"#;

const MULTISIG_ACCOUNT: &str = r#"module forge::multisig_account {
    use std::signer;
    use std::vector;

    const E_NOT_OWNER: u64 = 1;
    const E_ALREADY_APPROVED: u64 = 2;

    struct Wallet has key {
        owners: vector<address>,
        threshold: u64,
        approvals: vector<address>,
    }

    public entry fun create(creator: &signer, owners: vector<address>, threshold: u64) {
        move_to(creator, Wallet { owners, threshold, approvals: vector::empty() });
    }

    public entry fun multisig(owner: &signer, wallet: address) acquires Wallet {
        let wallet = borrow_global_mut<Wallet>(wallet);
        let sender = signer::address_of(owner);
        assert!(vector::contains(&wallet.owners, &sender), E_NOT_OWNER);
        assert!(!vector::contains(&wallet.approvals, &sender), E_ALREADY_APPROVED);
        vector::push_back(&mut wallet.approvals, sender);
    }

    #[view]
    public fun approved(wallet: address): bool acquires Wallet {
        let wallet = borrow_global<Wallet>(wallet);
        vector::length(&wallet.approvals) >= wallet.threshold
    }
}
"#;

const LEADERBOARD: &str = r#"module forge::leaderboard {
    use std::signer;
    use aptos_std::table::{Self, Table};

    const E_NOT_ADMIN: u64 = 1;

    struct Board has key {
        scores: Table<address, u64>,
        best: u64,
    }

    public entry fun initialize(admin: &signer) {
        move_to(admin, Board { scores: table::new(), best: 0 });
    }

    public entry fun leaderboard(admin: &signer, player: address, score: u64) acquires Board {
        let board = borrow_global_mut<Board>(signer::address_of(admin));
        let entry = table::borrow_mut_with_default(&mut board.scores, player, 0);
        if (score > *entry) {
            *entry = score;
        };
        if (score > board.best) {
            board.best = score;
        };
    }

    public entry fun rewards(admin: &signer, player: address, bonus: u64) acquires Board {
        let board = borrow_global_mut<Board>(signer::address_of(admin));
        let entry = table::borrow_mut_with_default(&mut board.scores, player, 0);
        *entry = *entry + bonus;
    }
}
"#;

const SOCIAL_PROFILE: &str = r#"module forge::social_profile {
    use std::signer;
    use std::string::String;
    use std::vector;

    const E_NO_PROFILE: u64 = 1;

    struct Profile has key {
        handle: String,
        bio: String,
        following: vector<address>,
    }

    public entry fun profiles(account: &signer, handle: String, bio: String) {
        move_to(account, Profile { handle, bio, following: vector::empty() });
    }

    public entry fun following(account: &signer, target: address) acquires Profile {
        let addr = signer::address_of(account);
        assert!(exists<Profile>(addr), E_NO_PROFILE);
        let profile = borrow_global_mut<Profile>(addr);
        if (!vector::contains(&profile.following, &target)) {
            vector::push_back(&mut profile.following, target);
        };
    }
}
"#;

const TIPPING: &str = r#"module forge::tipping {
    use std::signer;
    use aptos_framework::coin;
    use aptos_framework::aptos_coin::AptosCoin;
    use aptos_framework::event;

    const E_ZERO_TIP: u64 = 1;

    struct TipJar has key {
        received: u64,
    }

    #[event]
    struct Tipped has drop, store {
        from: address,
        to: address,
        amount: u64,
    }

    public entry fun open_jar(creator: &signer) {
        move_to(creator, TipJar { received: 0 });
    }

    public entry fun tipping(fan: &signer, creator: address, amount: u64) acquires TipJar {
        assert!(amount > 0, E_ZERO_TIP);
        coin::transfer<AptosCoin>(fan, creator, amount);
        let jar = borrow_global_mut<TipJar>(creator);
        jar.received = jar.received + amount;
        event::emit(Tipped { from: signer::address_of(fan), to: creator, amount });
    }
}
"#;

const ALLOWLIST_REGISTRY: &str = r#"module forge::allowlist_registry {
    use std::signer;
    use aptos_std::table::{Self, Table};

    const E_NOT_ADMIN: u64 = 1;

    struct Registry has key {
        admin: address,
        members: Table<address, bool>,
    }

    public entry fun initialize(admin: &signer) {
        let admin_addr = signer::address_of(admin);
        move_to(admin, Registry { admin: admin_addr, members: table::new() });
    }

    public entry fun allowlist(admin: &signer, member: address) acquires Registry {
        let admin_addr = signer::address_of(admin);
        let registry = borrow_global_mut<Registry>(admin_addr);
        assert!(registry.admin == admin_addr, E_NOT_ADMIN);
        table::upsert(&mut registry.members, member, true);
    }

    public entry fun revoke(admin: &signer, member: address) acquires Registry {
        let registry = borrow_global_mut<Registry>(signer::address_of(admin));
        table::upsert(&mut registry.members, member, false);
    }

    #[view]
    public fun is_allowed(registry: address, member: address): bool acquires Registry {
        let registry = borrow_global<Registry>(registry);
        *table::borrow_with_default(&registry.members, member, &false)
    }
}
"#;

const PAYMENT_SPLITTER: &str = r#"module forge::payment_splitter {
    use std::vector;
    use aptos_framework::coin;
    use aptos_framework::aptos_coin::AptosCoin;

    const E_LENGTH_MISMATCH: u64 = 1;

    struct Split has key {
        payees: vector<address>,
        shares: vector<u64>,
        total_shares: u64,
    }

    public entry fun create(owner: &signer, payees: vector<address>, shares: vector<u64>) {
        assert!(vector::length(&payees) == vector::length(&shares), E_LENGTH_MISMATCH);
        let total_shares = 0;
        let i = 0;
        while (i < vector::length(&shares)) {
            total_shares = total_shares + *vector::borrow(&shares, i);
            i = i + 1;
        };
        move_to(owner, Split { payees, shares, total_shares });
    }

    public entry fun payment_splitting(payer: &signer, split: address, amount: u64) acquires Split {
        let split = borrow_global<Split>(split);
        let i = 0;
        while (i < vector::length(&split.payees)) {
            let share = *vector::borrow(&split.shares, i);
            let payee = *vector::borrow(&split.payees, i);
            coin::transfer<AptosCoin>(payer, payee, amount * share / split.total_shares);
            i = i + 1;
        };
    }
}
"#;

/// The bundled template library
pub fn builtin_templates() -> Vec<ContractCandidate> {
    vec![
        ContractCandidate::new("nft_collection", ContractCategory::Nft, NFT_COLLECTION)
            .with_features(["minting", "token_creation", "royalties", "metadata"])
            .with_tags(["builtin", "token_v2"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("fungible_token", ContractCategory::Token, FUNGIBLE_TOKEN)
            .with_features(["minting", "burning", "transfers", "supply_management"])
            .with_tags(["builtin", "coin"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("nft_marketplace", ContractCategory::Marketplace, NFT_MARKETPLACE)
            .with_features(["listing", "auction", "escrow"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_framework", "aptos_std"]),
        ContractCandidate::new("staking_vault", ContractCategory::Defi, STAKING_VAULT)
            .with_features(["staking", "yield_farming"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("dao_voting", ContractCategory::Governance, DAO_VOTING)
            .with_features(["voting", "proposals"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_std"]),
        ContractCandidate::new("game_items", ContractCategory::Gaming, GAME_ITEMS)
            .with_features(["game_items", "rewards"])
            .with_tags(["builtin"])
            .with_dependencies(["std"]),
        ContractCandidate::new("digital_asset", ContractCategory::Nft, DIGITAL_ASSET)
            .with_features(["token_creation", "metadata", "transfers"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("managed_coin", ContractCategory::Token, MANAGED_COIN)
            .with_features(["minting", "transfers"])
            .with_tags(["builtin", "coin"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new(
            "fixed_price_listing",
            ContractCategory::Marketplace,
            FIXED_PRICE_LISTING,
        )
        .with_features(["listing"])
        .with_tags(["builtin"])
        .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("token_swap", ContractCategory::Defi, TOKEN_SWAP)
            .with_features(["swap", "liquidity_pool"])
            .with_tags(["builtin", "amm"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("multisig_account", ContractCategory::Governance, MULTISIG_ACCOUNT)
            .with_features(["multisig"])
            .with_tags(["builtin"])
            .with_dependencies(["std"]),
        ContractCandidate::new("leaderboard", ContractCategory::Gaming, LEADERBOARD)
            .with_features(["leaderboard", "rewards"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_std"]),
        ContractCandidate::new("social_profile", ContractCategory::Social, SOCIAL_PROFILE)
            .with_features(["profiles", "following"])
            .with_tags(["builtin"])
            .with_dependencies(["std"]),
        ContractCandidate::new("tipping", ContractCategory::Social, TIPPING)
            .with_features(["tipping"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_framework"]),
        ContractCandidate::new("allowlist_registry", ContractCategory::Utility, ALLOWLIST_REGISTRY)
            .with_features(["allowlist"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_std"]),
        ContractCandidate::new("payment_splitter", ContractCategory::Utility, PAYMENT_SPLITTER)
            .with_features(["payment_splitting"])
            .with_tags(["builtin"])
            .with_dependencies(["std", "aptos_framework"]),
    ]
}
