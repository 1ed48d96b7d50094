//! Discord event handler for serenity.
//!
//! Reports readiness and the bot's own voice state changes to the keeper.
//! Nothing here joins or leaves a channel; that stays with the maintenance
//! loop.

use std::num::NonZeroU64;

use {
    serenity::{
        all::{
            Context, EventHandler, GatewayIntents, Guild, GuildId, Ready, ResumedEvent,
            VoiceState,
        },
        async_trait,
    },
    tether_keeper::{KeeperHandle, VoiceStateChange},
    tracing::{debug, info},
};

/// Handler for Discord gateway events.
pub struct TetherHandler {
    handle: KeeperHandle,
}

impl TetherHandler {
    pub fn new(handle: KeeperHandle) -> Self {
        Self { handle }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES
    }

    fn is_target_guild(&self, guild_id: GuildId) -> bool {
        guild_id.get() == self.handle.target().guild_id.get()
    }
}

#[async_trait]
impl EventHandler for TetherHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            bot_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(guild_count = guilds.len(), "discord cache ready");
        self.handle.mark_ready();
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        if self.is_target_guild(guild.id) {
            debug!(guild_name = %guild.name, "target guild available");
            self.handle.mark_ready();
        }
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        debug!("discord gateway session resumed");
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(user_id) = NonZeroU64::new(new.user_id.get()) else {
            return;
        };
        let is_self = new.user_id == ctx.cache.current_user().id;
        let change = VoiceStateChange {
            guild_id: new.guild_id.and_then(|g| NonZeroU64::new(g.get())),
            user_id,
            is_self,
            before: old
                .and_then(|s| s.channel_id)
                .and_then(|c| NonZeroU64::new(c.get())),
            after: new.channel_id.and_then(|c| NonZeroU64::new(c.get())),
        };
        self.handle.observe_voice_state(&change);
    }
}
